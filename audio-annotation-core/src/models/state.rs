use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-node annotation state machine.
///
/// State transitions (tap unless noted):
/// ```text
/// idle → recording → has-audio → playing ↔ paused
///            ↓            ↑          │ (clip ends)
///          error          └──────────┘
///
/// has-audio / playing / paused / error ──long-press──→ idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    #[default]
    Idle,
    Recording,
    HasAudio,
    Playing,
    Paused,
    Error,
}

impl NodeState {
    /// State a freshly bound node starts in.
    pub fn derived(has_record: bool) -> Self {
        if has_record {
            Self::HasAudio
        } else {
            Self::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether a long-press on this state deletes the node's audio.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::HasAudio | Self::Playing | Self::Paused | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::HasAudio => "has-audio",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&NodeState::HasAudio).unwrap(), "\"has-audio\"");
        assert_eq!(NodeState::HasAudio.to_string(), "has-audio");
    }

    #[test]
    fn derived_from_record_presence() {
        assert_eq!(NodeState::derived(true), NodeState::HasAudio);
        assert_eq!(NodeState::derived(false), NodeState::Idle);
    }

    #[test]
    fn idle_and_recording_are_not_deletable() {
        assert!(!NodeState::Idle.is_deletable());
        assert!(!NodeState::Recording.is_deletable());
        assert!(NodeState::Paused.is_deletable());
        assert!(NodeState::Error.is_deletable());
    }
}
