//! Inference session state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of the single inference session.
///
/// `Unloaded → Ready → Generating → Ready → ...`, plus `* → Unloaded` on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No model context (never loaded, or dropped by a reset).
    #[default]
    Unloaded,
    /// Model loaded, no generation running.
    Ready,
    /// A turn owns the model context.
    Generating,
}

impl SessionState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Unloaded, Ready) | (Ready, Generating) | (Generating, Ready) | (_, Unloaded)
        )
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Ready => "ready",
            Self::Generating => "generating",
        };
        write!(f, "{s}")
    }
}
