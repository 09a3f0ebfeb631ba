//! DenseModel - CPU 上で動く最小の推論バックエンド
//!
//! 各 output は 1 つの input を線形変換（+ 任意で tanh）したものです。
//! 重みは row-major の `[out_width][in_width]` で持ちます。
//!
//! # ロード
//! - 先に登録済みのモデル名を探し、なければ ModelRef をファイルパスとして JSON を読む
//! - `Accelerated` が要求されても使えるアクセラレータはないので、警告して CPU で動かす
//!
//! # 学習ポイント
//! - trait object (`Box<dyn ModelHandle>`) として返す
//! - `release(self: Box<Self>)` で所有権ごと消費する

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ElementKind, TensorProxy, TensorSpec};
use crate::ports::{
    ExecuteError, InferenceDevice, LoadError, ModelHandle, ModelLoader, ModelMetadata, ModelRef,
    TensorMap,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Tanh,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Tanh => x.tanh(),
        }
    }
}

/// One output computed from one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseHead {
    pub output: TensorSpec,
    pub input: String,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseHead {
    pub fn new(output: TensorSpec, input: impl Into<String>, weights: Vec<f32>, bias: Vec<f32>) -> Self {
        Self {
            output,
            input: input.into(),
            weights,
            bias,
            activation: Activation::Identity,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }
}

/// Serialized form of a dense model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseModelDef {
    pub inputs: Vec<TensorSpec>,
    #[serde(default)]
    pub heads: Vec<DenseHead>,
    #[serde(default)]
    pub api_version: Option<u32>,
}

impl DenseModelDef {
    pub fn new(inputs: Vec<TensorSpec>) -> Self {
        Self {
            inputs,
            heads: Vec::new(),
            api_version: None,
        }
    }

    pub fn with_head(mut self, head: DenseHead) -> Self {
        self.heads.push(head);
        self
    }

    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Checks that every head's weights fit its input and output widths.
    fn check(&self) -> Result<(), String> {
        for head in &self.heads {
            let input = self
                .inputs
                .iter()
                .find(|i| i.name == head.input)
                .ok_or_else(|| format!("head '{}' reads undeclared input '{}'", head.output.name, head.input))?;
            let in_width = input
                .row_width()
                .ok_or_else(|| format!("input '{}' has a symbolic row shape", input.name))?;
            let out_width = head
                .output
                .row_width()
                .ok_or_else(|| format!("output '{}' has a symbolic row shape", head.output.name))?;
            if !head.output.is_batched() {
                return Err(format!("output '{}' must be batched", head.output.name));
            }
            if head.weights.len() != out_width * in_width {
                return Err(format!(
                    "head '{}' has {} weights, expected {out_width}x{in_width}",
                    head.output.name,
                    head.weights.len()
                ));
            }
            if head.bias.len() != out_width {
                return Err(format!(
                    "head '{}' has {} biases, expected {out_width}",
                    head.output.name,
                    head.bias.len()
                ));
            }
        }
        Ok(())
    }
}

pub struct DenseModel {
    def: DenseModelDef,
    outputs: Vec<TensorSpec>,
    released: Arc<AtomicUsize>,
}

impl DenseModel {
    fn run_head(head: &DenseHead, inputs: &TensorMap) -> Result<TensorProxy, ExecuteError> {
        let input = inputs
            .get(&head.input)
            .ok_or_else(|| ExecuteError(format!("input '{}' was not bound", head.input)))?;
        let n = input.batch_len();
        let in_width = input.row_width();
        let out_width = head.bias.len();
        if head.weights.len() != out_width * in_width {
            return Err(ExecuteError(format!(
                "input '{}' rows have {in_width} values, head '{}' was built for {}",
                head.input,
                head.output.name,
                head.weights.len() / out_width.max(1)
            )));
        }

        let mut values = Vec::with_capacity(n * out_width);
        for row in 0..n {
            let x = input.row_f32(row);
            for (o, bias) in head.bias.iter().enumerate() {
                let w = &head.weights[o * in_width..(o + 1) * in_width];
                let sum: f32 = w.iter().zip(&x).map(|(w, x)| w * x).sum::<f32>() + bias;
                values.push(head.activation.apply(sum));
            }
        }

        let shape = head.output.bind(n);
        Ok(match head.output.element_kind {
            ElementKind::Float => TensorProxy::from_f32(&head.output.name, shape, values),
            ElementKind::Int => TensorProxy::from_i32(
                &head.output.name,
                shape,
                values.iter().map(|v| v.round() as i32).collect(),
            ),
        })
    }
}

impl ModelHandle for DenseModel {
    fn input_signature(&self) -> &[TensorSpec] {
        &self.def.inputs
    }

    fn output_signature(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            api_version: self.def.api_version,
        }
    }

    fn execute(&mut self, inputs: &TensorMap) -> Result<TensorMap, ExecuteError> {
        self.def
            .heads
            .iter()
            .map(|head| Ok((head.output.name.clone(), Self::run_head(head, inputs)?)))
            .collect()
    }

    fn release(self: Box<Self>) {
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!(outputs = self.outputs.len(), "dense model released");
    }
}

/// Load / release counts, for leak checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub loaded: usize,
    pub released: usize,
}

/// Loads `DenseModel`s by registered name or from a JSON file.
#[derive(Debug, Default)]
pub struct DenseModelLoader {
    registry: HashMap<String, DenseModelDef>,
    loaded: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl DenseModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>, def: DenseModelDef) -> Self {
        self.registry.insert(name.into(), def);
        self
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            loaded: self.loaded.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }

    fn resolve(&self, reference: &ModelRef) -> Result<DenseModelDef, LoadError> {
        if let Some(def) = self.registry.get(reference.as_str()) {
            return Ok(def.clone());
        }
        let raw = match std::fs::read_to_string(reference.as_str()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(reference.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| LoadError::Malformed {
            reference: reference.clone(),
            reason: e.to_string(),
        })
    }
}

impl ModelLoader for DenseModelLoader {
    fn load(&self, reference: &ModelRef, device: InferenceDevice) -> Result<Box<dyn ModelHandle>, LoadError> {
        if device == InferenceDevice::Accelerated {
            warn!(model = %reference, "no accelerator available, running on CPU");
        }
        let def = self.resolve(reference)?;
        def.check().map_err(|reason| LoadError::Malformed {
            reference: reference.clone(),
            reason,
        })?;
        let outputs = def.heads.iter().map(|h| h.output.clone()).collect();
        self.loaded.fetch_add(1, Ordering::SeqCst);
        debug!(model = %reference, heads = def.heads.len(), "dense model loaded");
        Ok(Box::new(DenseModel {
            def,
            outputs,
            released: self.released.clone(),
        }))
    }
}
