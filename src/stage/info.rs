//! Status snapshots for layers and stages.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Derived state of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    /// Nothing on air.
    Stopped,
    /// On air, frozen.
    Paused,
    /// On air, advancing.
    Playing,
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Playing => "playing",
        })
    }
}

/// Snapshot of one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    /// Derived state.
    pub status: LayerStatus,
    /// Armed auto-play lead.
    pub auto_delta: Option<i32>,
    /// Frames pulled since the foreground went on air.
    pub frame_number: i64,
    /// Length of the foreground, `-1` if unbounded.
    pub nb_frames: i64,
    /// Frames until auto-play fires or the foreground ends, `-1` if unbounded.
    pub frames_left: i64,
    /// Foreground producer snapshot.
    pub foreground: serde_json::Value,
    /// Background producer snapshot.
    pub background: serde_json::Value,
}

/// Snapshot of a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageInfo {
    /// Video format name.
    pub format: String,
    /// Layers by index.
    pub layers: BTreeMap<i32, LayerInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_info_serializes() {
        let info = LayerInfo {
            status: LayerStatus::Playing,
            auto_delta: None,
            frame_number: 3,
            nb_frames: -1,
            frames_left: -1,
            foreground: serde_json::json!({ "type": "color-producer" }),
            background: serde_json::json!({ "type": "empty-producer" }),
        };
        let json = serde_json::to_value(StageInfo {
            format: "PAL".to_string(),
            layers: BTreeMap::from([(10, info)]),
        })
        .unwrap();

        assert_eq!(json["layers"]["10"]["status"], "playing");
        assert_eq!(json["layers"]["10"]["auto_delta"], serde_json::Value::Null);
        assert_eq!(json["layers"]["10"]["foreground"]["type"], "color-producer");
    }
}
