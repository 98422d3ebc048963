//! Monitor paths.

use serde::Serialize;
use std::fmt;

/// A `/`-separated event address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MonitorPath(String);

impl MonitorPath {
    /// The empty path.
    pub const fn new() -> Self {
        Self(String::new())
    }

    /// Append a segment, inserting a `/` unless it already starts with one.
    ///
    /// Empty segments are ignored.
    pub fn push(&mut self, segment: impl fmt::Display) {
        let segment = segment.to_string();
        if segment.is_empty() {
            return;
        }
        if !segment.starts_with('/') {
            self.0.push('/');
        }
        self.0.push_str(&segment);
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn join(mut self, segment: impl fmt::Display) -> Self {
        self.push(segment);
        self
    }

    /// Append every segment of `other`.
    #[must_use]
    pub fn concat(mut self, other: &Self) -> Self {
        self.0.push_str(&other.0);
        self
    }

    /// The path as text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the path has no segments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for MonitorPath {
    fn from(value: &str) -> Self {
        Self::new().join(value)
    }
}

impl From<String> for MonitorPath {
    fn from(value: String) -> Self {
        Self::new().join(value)
    }
}

impl fmt::Display for MonitorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
