//! Monitor events and their typed parameters.

use super::MonitorPath;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A typed event parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    /// Boolean.
    Bool(bool),
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// Single precision float.
    F32(f32),
    /// Double precision float.
    F64(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Elapsed time, rendered in seconds.
    Duration(Duration),
}

macro_rules! param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

param_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    Duration => Duration,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Bytes(v) => write!(f, "[{} bytes]", v.len()),
            Self::Duration(v) => write!(f, "{}s", v.as_secs_f64()),
        }
    }
}

/// A status update addressed by path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Address.
    path: MonitorPath,
    /// Values, in order.
    params: Vec<Param>,
}

impl Event {
    /// An event with no parameters.
    pub fn new(path: impl Into<MonitorPath>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// The same event, addressed below `prefix`.
    #[must_use]
    pub fn propagate(&self, prefix: &MonitorPath) -> Self {
        Self {
            path: prefix.clone().concat(&self.path),
            params: self.params.clone(),
        }
    }

    /// Address.
    #[inline]
    pub const fn path(&self) -> &MonitorPath {
        &self.path
    }

    /// Values, in order.
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_params_in_order() {
        let event = Event::new("frame").with(12_i64).with(250_i64);
        assert_eq!(event.path().as_str(), "/frame");
        assert_eq!(event.params(), &[Param::I64(12), Param::I64(250)]);
        assert_eq!(event.to_string(), "/frame 12 250");
    }

    #[test]
    fn test_propagate_prefixes_path() {
        let event = Event::new("/foo").with(true);
        let scoped = event.propagate(&MonitorPath::from("/bar"));
        assert_eq!(scoped.path().as_str(), "/bar/foo");
        assert_eq!(scoped.params(), event.params());
    }

    #[test]
    fn test_param_display() {
        assert_eq!(Param::from("clip").to_string(), "clip");
        assert_eq!(Param::from(Duration::from_millis(500)).to_string(), "0.5s");
        assert_eq!(Param::from(vec![1_u8, 2, 3]).to_string(), "[3 bytes]");
    }

    #[test]
    fn test_event_serializes() {
        let event = Event::new("paused").with(false);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["path"], "/paused");
        assert_eq!(json["params"][0], false);
    }
}
