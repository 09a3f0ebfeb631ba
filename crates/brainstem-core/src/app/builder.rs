//! BrainBuilder - brain の構築とワイヤリング
//!
//! # 起動時検証（Fail-fast）
//! ObservationSpec 自体が壊れている場合（スタック数 0、空の visual 形状、
//! アクションのない action space など）は build() の時点で弾きます。
//! モデルとの整合性はここではなく reload 時の Validator が見ます。

use std::sync::Arc;

use crate::app::config::BrainConfig;
use crate::app::controller::BrainController;
use crate::domain::ObservationSpec;
use crate::ports::{IdGenerator, ModelLoader, NoopSpanHook, RemoteChannel, SpanHook, SystemClock, UlidGenerator};

/// BrainBuilder は BrainController を組み立てる
///
/// # 使用例
/// ```ignore
/// let mut brain = BrainBuilder::new(spec, Arc::new(DenseModelLoader::new()))
///     .config(BrainConfig::default().with_model("walker.json"))
///     .build()?;
/// brain.initialize()?;
/// ```
pub struct BrainBuilder {
    spec: ObservationSpec,
    loader: Arc<dyn ModelLoader>,
    config: BrainConfig,
    remote: Option<Box<dyn RemoteChannel>>,
    spans: Arc<dyn SpanHook>,
    ids: Arc<dyn IdGenerator>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("num_stacked_vector_observations must be at least 1")]
    ZeroStacks,

    #[error("visual observation #{0} has a zero-sized dimension")]
    EmptyVisualShape(usize),

    #[error("action space declares no actions")]
    EmptyActionSpace,

    #[error("discrete branch {0} has no actions")]
    EmptyBranch(usize),

    #[error("brain name must not be empty")]
    EmptyBrainName,
}

impl BrainBuilder {
    pub fn new(spec: ObservationSpec, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            spec,
            loader,
            config: BrainConfig::default(),
            remote: None,
            spans: Arc::new(NoopSpanHook),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn config(mut self, config: BrainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn remote(mut self, remote: Box<dyn RemoteChannel>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn span_hook(mut self, hook: Arc<dyn SpanHook>) -> Self {
        self.spans = hook;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Checks the observation spec and wires the controller.
    ///
    /// The model is not loaded here; call `initialize` on the result.
    pub fn build(self) -> Result<BrainController, BuildError> {
        check_spec(&self.spec)?;
        if self.config.brain_name.trim().is_empty() {
            return Err(BuildError::EmptyBrainName);
        }
        Ok(BrainController::new(
            self.config,
            self.spec,
            self.loader,
            self.ids,
            self.spans,
            self.remote,
        ))
    }
}

fn check_spec(spec: &ObservationSpec) -> Result<(), BuildError> {
    if spec.num_stacked_vector_observations == 0 {
        return Err(BuildError::ZeroStacks);
    }
    if let Some(index) = spec.visual_observation_shapes.iter().position(|s| s.is_empty()) {
        return Err(BuildError::EmptyVisualShape(index));
    }
    let actions = &spec.action_space;
    if actions.continuous_size == 0 && actions.discrete_branch_sizes.is_empty() {
        return Err(BuildError::EmptyActionSpace);
    }
    if let Some(branch) = actions.discrete_branch_sizes.iter().position(|&n| n == 0) {
        return Err(BuildError::EmptyBranch(branch));
    }
    Ok(())
}
