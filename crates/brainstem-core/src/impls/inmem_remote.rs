//! InMemoryRemoteChannel - 開発用のリモートチャネル
//!
//! 受け取った batch をそのまま溜めておくだけです。
//! 状態は `Arc<Mutex<..>>` で共有するので、controller に渡した後も
//! clone したハンドルから接続状態の切り替えや転送内容の確認ができます。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{AgentBatch, ObservationSpec};
use crate::ports::{ChannelError, RemoteChannel};

#[derive(Debug, Default)]
struct ChannelState {
    active: bool,
    subscriptions: HashMap<String, ObservationSpec>,
    forwarded: Vec<(String, AgentBatch)>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryRemoteChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that reports itself connected.
    pub fn connected() -> Self {
        let channel = Self::new();
        channel.set_active(true);
        channel
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_active(&self, active: bool) {
        self.lock().active = active;
    }

    pub fn is_subscribed(&self, brain_name: &str) -> bool {
        self.lock().subscriptions.contains_key(brain_name)
    }

    /// Batches received so far, in arrival order.
    pub fn forwarded(&self) -> Vec<(String, AgentBatch)> {
        self.lock().forwarded.clone()
    }
}

impl RemoteChannel for InMemoryRemoteChannel {
    fn is_active(&self) -> bool {
        self.lock().active
    }

    fn subscribe(&mut self, brain_name: &str, spec: &ObservationSpec) -> Result<(), ChannelError> {
        self.lock()
            .subscriptions
            .insert(brain_name.to_string(), spec.clone());
        Ok(())
    }

    fn put_observations(&mut self, brain_name: &str, batch: AgentBatch) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if !state.active {
            return Err(ChannelError::Disconnected);
        }
        if !state.subscriptions.contains_key(brain_name) {
            return Err(ChannelError::NotSubscribed(brain_name.to_string()));
        }
        state.forwarded.push((brain_name.to_string(), batch));
        Ok(())
    }
}
