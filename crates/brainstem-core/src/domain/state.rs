//! State - brain の状態
//!
//! # 状態遷移
//! - Unloaded -> Loaded: reload で検証済みモデルを受け入れた
//! - Loaded -> Loaded: 別モデルへの reload（検証を通った場合のみ）
//! - Loaded -> Unloaded: モデルなしの reload、検証失敗、shutdown

use super::ids::ModelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrainState {
    Unloaded,
    Loaded(ModelId),
}

impl BrainState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, BrainState::Loaded(_))
    }

    pub fn model_id(&self) -> Option<ModelId> {
        match self {
            BrainState::Loaded(id) => Some(*id),
            BrainState::Unloaded => None,
        }
    }
}

/// What one decision tick produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Local inference decided these actions, in batch order.
    Decided(Vec<super::agent::AgentAction>),

    /// The batch was handed to the remote channel.
    Forwarded,

    /// Nothing ran this tick.
    Skipped(super::errors::UnavailableReason),
}
