//! Monitor: Path-addressed status events and their fan-out.
//!
//! Components publish [`Event`]s into a [`Subject`]. A subject prefixes every
//! event with its own scope and forwards it to its subscribers, so subjects
//! chain into a tree:
//!
//! ```text
//! layer subject ("/layer/10") ──▶ stage subject ("/stage") ──▶ observers
//!     "/paused"                     "/layer/10/paused"          "/stage/layer/10/paused"
//! ```

mod event;
mod path;
mod subject;

pub use event::{Event, Param};
pub use path::MonitorPath;
pub use subject::{Observer, Subject};
