//! Model port - 推論エンジンの抽象化
//!
//! モデルは不透明なハンドルとして扱います。
//! このクレートが知っているのは次の capability だけです:
//! load / input signature / output signature / execute / release
//!
//! CPU でもアクセラレータでも、この trait を満たせば差し替え可能です。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BrainError, TensorProxy, TensorSpec};

/// Named tensors, as passed to and returned from `execute`.
pub type TensorMap = HashMap<String, TensorProxy>;

/// Where inference runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceDevice {
    #[default]
    Cpu,
    Accelerated,
}

/// Reference to a model artifact (path, key, URI...). Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRef(pub String);

impl ModelRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional constants a model may carry next to its signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub api_version: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model '{0}' not found")]
    NotFound(ModelRef),

    #[error("model '{reference}' is malformed: {reason}")]
    Malformed { reference: ModelRef, reason: String },

    #[error("io error reading model: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LoadError> for BrainError {
    fn from(e: LoadError) -> Self {
        BrainError::Load(e.to_string())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ExecuteError(pub String);

impl From<ExecuteError> for BrainError {
    fn from(e: ExecuteError) -> Self {
        BrainError::Execution(e.0)
    }
}

/// A loaded network.
///
/// # 契約
/// - signature はロード後に変化しない（差し替えは新しいハンドルで行う）
/// - `execute` はブロッキング呼び出し。内部で並列化してもよい
/// - `release` は `Box<Self>` を消費するので二重解放できない
pub trait ModelHandle: Send {
    fn input_signature(&self) -> &[TensorSpec];

    fn output_signature(&self) -> &[TensorSpec];

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata::default()
    }

    /// Runs the network on named inputs and returns named outputs.
    fn execute(&mut self, inputs: &TensorMap) -> Result<TensorMap, ExecuteError>;

    /// Frees backend resources.
    fn release(self: Box<Self>);
}

/// ModelLoader は ModelRef からハンドルを作る
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        reference: &ModelRef,
        device: InferenceDevice,
    ) -> Result<Box<dyn ModelHandle>, LoadError>;
}
