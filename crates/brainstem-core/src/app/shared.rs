//! SharedBrain - 複数の所有者から brain を使うためのハンドル
//!
//! # 排他
//! 中身は `Arc<Mutex<BrainController>>` です。tick と reload は同じロックを取るので、
//! 実行中の tick の途中でモデルが差し替わることはありません。
//!
//! # Async
//! 推論はブロッキング処理なので、async からは `decide_blocking` を使い
//! `spawn_blocking` 上で実行します。

use std::sync::{Arc, Mutex, MutexGuard};

use crate::app::config::BrainConfig;
use crate::app::controller::BrainController;
use crate::domain::{AgentAction, AgentBatch, AgentId, BrainError, BrainState, TickOutcome};

#[derive(Clone)]
pub struct SharedBrain {
    inner: Arc<Mutex<BrainController>>,
}

impl SharedBrain {
    pub fn new(controller: BrainController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Poisoned locks are recovered; a failed tick leaves no partial state.
    fn lock(&self) -> MutexGuard<'_, BrainController> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn decide(&self, batch: AgentBatch) -> Result<TickOutcome, BrainError> {
        self.lock().decide(batch)
    }

    pub fn reload(&self, config: BrainConfig) -> Result<BrainState, BrainError> {
        self.lock().reload(config)
    }

    pub fn initialize(&self) -> Result<BrainState, BrainError> {
        self.lock().initialize()
    }

    pub fn state(&self) -> BrainState {
        self.lock().state()
    }

    pub fn last_action(&self, id: &AgentId) -> AgentAction {
        self.lock().last_action(id)
    }

    pub fn forget_agent(&self, id: &AgentId) {
        self.lock().forget_agent(id);
    }

    pub fn reset_episode(&self) {
        self.lock().reset_episode();
    }

    pub fn shutdown(&self) {
        self.lock().shutdown();
    }

    /// Runs a tick on the blocking pool.
    pub async fn decide_blocking(&self, batch: AgentBatch) -> Result<TickOutcome, BrainError> {
        let brain = self.clone();
        tokio::task::spawn_blocking(move || brain.decide(batch))
            .await
            .map_err(|e| BrainError::Execution(format!("decision task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::BrainBuilder;
    use crate::domain::names;
    use crate::domain::{ActionSpace, AgentRecord, ObservationSpec, TensorSpec};
    use crate::impls::{DenseHead, DenseModelDef, DenseModelLoader};
    use ulid::Ulid;

    fn shared() -> SharedBrain {
        let def = DenseModelDef::new(vec![TensorSpec::batched(names::VECTOR_OBSERVATION, 2)])
            .with_head(DenseHead::new(
                TensorSpec::batched(names::CONTINUOUS_ACTIONS, 1),
                names::VECTOR_OBSERVATION,
                vec![1.0, -1.0],
                vec![0.5],
            ));
        let loader = Arc::new(DenseModelLoader::new().with_model("diff", def));
        let brain = BrainBuilder::new(ObservationSpec::vector(2, ActionSpace::continuous(1)), loader)
            .config(BrainConfig::default().with_model("diff"))
            .build()
            .unwrap();
        SharedBrain::new(brain)
    }

    #[tokio::test]
    async fn decide_on_blocking_pool() {
        let brain = shared();
        brain.initialize().unwrap();
        let id = AgentId::from_ulid(Ulid(7));
        let out = brain
            .decide_blocking(AgentBatch::new(vec![AgentRecord::new(id, vec![3.0, 1.0])]))
            .await
            .unwrap();
        let TickOutcome::Decided(actions) = out else {
            panic!("expected actions");
        };
        assert_eq!(actions[0].continuous, vec![2.5]);
        assert_eq!(brain.last_action(&id).continuous, vec![2.5]);
    }

    #[tokio::test]
    async fn reload_to_none_is_seen_by_clones() {
        let brain = shared();
        brain.initialize().unwrap();
        let other = brain.clone();
        other.reload(BrainConfig::default()).unwrap();
        assert_eq!(brain.state(), BrainState::Unloaded);
    }
}
