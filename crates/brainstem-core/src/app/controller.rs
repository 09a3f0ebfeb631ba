//! BrainController - decision tick の司令塔
//!
//! # tick のフロー
//! 1. リモートチャネルが接続中なら batch を渡して終了（ローカル推論は走らない）
//! 2. モデル未ロードならスキップ（エラーではない）
//! 3. Generator → Executor → Applier を順に実行
//! 4. 全段成功したときだけ agent メモリと直前アクションを更新
//!
//! どの段で失敗しても tick 全体を中止し、警告は tick ごとに 1 回だけ出します。
//! 失敗した tick では agent は直前のアクションを保持します。
//!
//! # agent の寿命
//! agent ごとのメモリと直前アクションは、その agent が batch に現れなくなっても残ります。
//! 環境から退場した agent は呼び出し側が `forget_agent` で明示的に捨ててください。
//! episode の切れ目では `reset_episode` でまとめて捨てられます。
//!
//! # 排他
//! `decide` も `reload` も `&mut self` を取るので、
//! 同じ controller 上で tick とモデル差し替えが重なることはありません。
//! 複数の所有者から使う場合は `SharedBrain` を使います。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, debug_span, info, warn};

use crate::app::config::BrainConfig;
use crate::domain::{
    AgentAction, AgentBatch, AgentId, BrainError, BrainState, CompatibilityViolation,
    ObservationSpec, TensorSpec, TickOutcome, UnavailableReason,
};
use crate::pipeline::{
    InferenceExecutor, TensorAllocator, TensorApplier, TensorGenerator, AgentMemoryStore, certify,
};
use crate::ports::span::stage;
use crate::ports::{IdGenerator, ModelLoader, RemoteChannel, SpanHook};

pub struct BrainController {
    config: BrainConfig,
    spec: ObservationSpec,
    loader: Arc<dyn ModelLoader>,
    ids: Arc<dyn IdGenerator>,
    spans: Arc<dyn SpanHook>,
    remote: Option<Box<dyn RemoteChannel>>,
    executor: InferenceExecutor,
    generator: TensorGenerator,
    applier: TensorApplier,
    allocator: TensorAllocator,
    memory: AgentMemoryStore,
    last_actions: HashMap<AgentId, AgentAction>,
}

impl BrainController {
    /// Use `BrainBuilder` instead of calling this directly.
    pub(crate) fn new(
        config: BrainConfig,
        spec: ObservationSpec,
        loader: Arc<dyn ModelLoader>,
        ids: Arc<dyn IdGenerator>,
        spans: Arc<dyn SpanHook>,
        remote: Option<Box<dyn RemoteChannel>>,
    ) -> Self {
        let generator = TensorGenerator::new(spec.clone(), config.seed);
        let applier =
            TensorApplier::new(spec.action_space.clone(), config.discrete_policy, config.seed);
        Self {
            config,
            spec,
            loader,
            ids,
            spans,
            remote,
            executor: InferenceExecutor::new(),
            generator,
            applier,
            allocator: TensorAllocator::new(),
            memory: AgentMemoryStore::new(),
            last_actions: HashMap::new(),
        }
    }

    /// Subscribes the remote channel (if any) and loads the configured model.
    pub fn initialize(&mut self) -> Result<BrainState, BrainError> {
        if let Some(remote) = self.remote.as_mut()
            && let Err(e) = remote.subscribe(&self.config.brain_name, &self.spec)
        {
            warn!(brain = %self.config.brain_name, error = %e, "remote subscribe failed");
        }
        self.reload(self.config.clone())
    }

    /// Releases the model and drops all per-agent state.
    pub fn shutdown(&mut self) {
        self.executor.unload();
        self.reset_episode();
        self.last_actions.clear();
        info!(brain = %self.config.brain_name, "brain shut down");
    }

    /// Applies `config`: loads and validates its model, or unloads when it has none.
    ///
    /// The old model is released before the new one is installed. If loading or
    /// validation fails the brain ends up `Unloaded`. A renamed brain is
    /// re-subscribed on the attached remote channel; a blank name is rejected
    /// and leaves the current state untouched.
    pub fn reload(&mut self, config: BrainConfig) -> Result<BrainState, BrainError> {
        if config.brain_name.trim().is_empty() {
            return Err(BrainError::Configuration(vec![CompatibilityViolation::new(
                "brain_name",
                "a non-empty name",
                config.brain_name.clone(),
                "brain name must not be empty",
            )]));
        }
        if config.brain_name != self.config.brain_name
            && let Some(remote) = self.remote.as_mut()
            && let Err(e) = remote.subscribe(&config.brain_name, &self.spec)
        {
            warn!(brain = %config.brain_name, error = %e, "remote subscribe failed");
        }

        self.generator = TensorGenerator::new(self.spec.clone(), config.seed);
        self.applier = TensorApplier::new(
            self.spec.action_space.clone(),
            config.discrete_policy,
            config.seed,
        );
        self.memory.clear();
        self.allocator.reset();
        self.last_actions.clear();

        let reference = config.model.clone();
        let device = config.device;
        self.config = config;

        let Some(reference) = reference else {
            self.executor.swap(None);
            info!(brain = %self.config.brain_name, "no model configured, brain unloaded");
            return Ok(BrainState::Unloaded);
        };

        let handle = match self.loader.load(&reference, device) {
            Ok(handle) => handle,
            Err(e) => {
                self.executor.swap(None);
                warn!(brain = %self.config.brain_name, model = %reference, error = %e, "model load failed");
                return Err(e.into());
            }
        };

        match certify(&self.spec, handle) {
            Ok(validated) => {
                let id = self.ids.generate_model_id();
                self.executor.swap(Some((id, validated)));
                info!(brain = %self.config.brain_name, model = %reference, id = %id, "model loaded");
                Ok(BrainState::Loaded(id))
            }
            Err(e) => {
                self.executor.swap(None);
                warn!(brain = %self.config.brain_name, model = %reference, "model rejected: {e}");
                Err(e)
            }
        }
    }

    /// Runs one decision tick for `batch`.
    ///
    /// `Ok(Skipped(..))` is not a failure. `Err` means the whole tick was
    /// aborted and no agent got a new action.
    pub fn decide(&mut self, batch: AgentBatch) -> Result<TickOutcome, BrainError> {
        if let Some(remote) = self.remote.as_mut()
            && remote.is_active()
        {
            let agents = batch.len();
            return match remote.put_observations(&self.config.brain_name, batch) {
                Ok(()) => {
                    debug!(brain = %self.config.brain_name, agents, "batch forwarded to remote");
                    Ok(TickOutcome::Forwarded)
                }
                Err(e) => {
                    warn!(brain = %self.config.brain_name, error = %e, "remote hand-off failed");
                    Ok(TickOutcome::Skipped(UnavailableReason::RemoteActive))
                }
            };
        }

        if !self.executor.is_loaded() {
            debug!(brain = %self.config.brain_name, "{}", UnavailableReason::NoModel);
            return Ok(TickOutcome::Skipped(UnavailableReason::NoModel));
        }
        if batch.is_empty() {
            return Ok(TickOutcome::Decided(Vec::new()));
        }

        match self.run_pipeline(&batch) {
            Ok(actions) => {
                self.memory
                    .commit(&batch, &actions, self.spec.history_len());
                for action in &actions {
                    self.last_actions.insert(action.agent_id, action.clone());
                }
                Ok(TickOutcome::Decided(actions))
            }
            Err(BrainError::Unavailable(reason)) => Ok(TickOutcome::Skipped(reason)),
            Err(e) => {
                warn!(
                    brain = %self.config.brain_name,
                    agents = batch.len(),
                    step = batch.step,
                    "tick aborted: {e}"
                );
                Err(e)
            }
        }
    }

    fn run_pipeline(&mut self, batch: &AgentBatch) -> Result<Vec<AgentAction>, BrainError> {
        let spans = self.spans.as_ref();
        let signature: Vec<TensorSpec> = self
            .executor
            .input_signature()
            .ok_or(BrainError::Unavailable(UnavailableReason::NoModel))?
            .to_vec();

        let inputs = timed(spans, stage::GENERATE, || {
            self.generator
                .generate(&signature, batch, &self.memory, &mut self.allocator)
        })?;

        let executed = timed(spans, stage::EXECUTE, || self.executor.execute(&inputs));
        self.allocator.recycle_all(inputs);
        let outputs = executed?;

        timed(spans, stage::APPLY, || self.applier.apply(&outputs, batch))
    }

    pub fn state(&self) -> BrainState {
        match self.executor.model_id() {
            Some(id) => BrainState::Loaded(id),
            None => BrainState::Unloaded,
        }
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    pub fn observation_spec(&self) -> &ObservationSpec {
        &self.spec
    }

    pub fn input_signature(&self) -> Option<&[TensorSpec]> {
        self.executor.input_signature()
    }

    pub fn output_signature(&self) -> Option<&[TensorSpec]> {
        self.executor.output_signature()
    }

    /// The most recent action decided for `id`, or an all-zero no-op.
    pub fn last_action(&self, id: &AgentId) -> AgentAction {
        self.last_actions.get(id).cloned().unwrap_or_else(|| {
            AgentAction::no_op(
                *id,
                self.spec.action_space.continuous_size,
                self.spec.action_space.discrete_branch_sizes.len(),
            )
        })
    }

    /// Drops everything remembered about an agent that left.
    ///
    /// Nothing is evicted automatically; callers own agent lifetimes.
    pub fn forget_agent(&mut self, id: &AgentId) {
        self.memory.forget(id);
        self.last_actions.remove(id);
    }

    /// Episode boundary: clears agent memory and pooled tensor buffers.
    pub fn reset_episode(&mut self) {
        self.memory.clear();
        self.allocator.reset();
    }

    pub fn attach_remote(&mut self, mut remote: Box<dyn RemoteChannel>) {
        if let Err(e) = remote.subscribe(&self.config.brain_name, &self.spec) {
            warn!(brain = %self.config.brain_name, error = %e, "remote subscribe failed");
        }
        self.remote = Some(remote);
    }

    pub fn detach_remote(&mut self) -> Option<Box<dyn RemoteChannel>> {
        self.remote.take()
    }

    pub fn allocator(&self) -> &TensorAllocator {
        &self.allocator
    }

    /// Number of agents with stored memory.
    pub fn remembered_agents(&self) -> usize {
        self.memory.len()
    }
}

fn timed<R>(hook: &dyn SpanHook, name: &'static str, f: impl FnOnce() -> R) -> R {
    let span = debug_span!("brain_stage", stage = name);
    let _entered = span.enter();
    let start = Instant::now();
    let result = f();
    hook.record(name, start.elapsed());
    result
}
