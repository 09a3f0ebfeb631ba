//! RemoteChannel port - 外部トレーニングプロセスへの委譲
//!
//! 接続中の channel があると、その brain のローカル推論は完全にスキップされ、
//! その tick のアクションはリモート側が責任を持ちます。

use thiserror::Error;

use crate::domain::{AgentBatch, ObservationSpec};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not connected")]
    Disconnected,

    #[error("brain '{0}' is not subscribed")]
    NotSubscribed(String),
}

/// RemoteChannel は双方向チャネルの送信側
pub trait RemoteChannel: Send {
    /// Whether the channel is connected right now.
    fn is_active(&self) -> bool;

    fn subscribe(&mut self, brain_name: &str, spec: &ObservationSpec) -> Result<(), ChannelError>;

    /// Hands the whole batch over; ownership of this tick's actions moves to the remote side.
    fn put_observations(&mut self, brain_name: &str, batch: AgentBatch) -> Result<(), ChannelError>;
}
