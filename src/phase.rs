use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a remote wake word detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeWordPhase {
    /// Detector is armed and waiting for the wake word
    Listening,
    /// Wake word was detected and the conversation is running
    Active,
    /// Detection disabled, not reported yet or no channel
    #[default]
    Unknown,
}

impl WakeWordPhase {
    /// Label used on the wire. `Unknown` is never sent.
    pub fn wire_label(&self) -> Option<&'static str> {
        match self {
            WakeWordPhase::Listening => Some("listening"),
            WakeWordPhase::Active => Some("active"),
            WakeWordPhase::Unknown => None,
        }
    }

    pub fn from_wire_label(label: &str) -> Option<Self> {
        match label {
            "listening" => Some(WakeWordPhase::Listening),
            "active" => Some(WakeWordPhase::Active),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != WakeWordPhase::Unknown
    }
}

impl fmt::Display for WakeWordPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeWordPhase::Listening => write!(f, "listening"),
            WakeWordPhase::Active => write!(f, "active"),
            WakeWordPhase::Unknown => write!(f, "unknown"),
        }
    }
}

/// Phase together with the time it was last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PhaseSnapshot {
    pub phase: WakeWordPhase,
    pub updated_at: Option<DateTime<Utc>>,
}
