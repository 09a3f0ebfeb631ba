//! InferenceExecutor - ロード済みモデルの所有と実行
//!
//! # 契約
//! - 同時に保持するモデルは最大 1 つ
//! - 入力は名前で束縛する（位置では束縛しない）
//! - signature に載っている出力が 1 つでも欠けたら実行エラー
//! - 差し替え時は古いモデルを必ず 1 回だけ release する
//!
//! 受け付けるのは `ValidatedModel` だけなので、
//! 検証を通っていないモデルが実行されることはありません。

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::{BrainError, ModelId, TensorSpec, UnavailableReason};
use crate::pipeline::validator::ValidatedModel;
use crate::ports::TensorMap;

struct Installed {
    id: ModelId,
    model: ValidatedModel,
}

#[derive(Default)]
pub struct InferenceExecutor {
    installed: Option<Installed>,
}

impl InferenceExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.installed.is_some()
    }

    pub fn model_id(&self) -> Option<ModelId> {
        self.installed.as_ref().map(|i| i.id)
    }

    pub fn input_signature(&self) -> Option<&[TensorSpec]> {
        self.installed.as_ref().map(|i| i.model.handle().input_signature())
    }

    pub fn output_signature(&self) -> Option<&[TensorSpec]> {
        self.installed.as_ref().map(|i| i.model.handle().output_signature())
    }

    /// Installs `next` (or nothing), releasing the current model first.
    pub fn swap(&mut self, next: Option<(ModelId, ValidatedModel)>) {
        self.unload();
        if let Some((id, model)) = next {
            info!(model = %id, "model installed");
            self.installed = Some(Installed { id, model });
        }
    }

    /// Releases the current model, if any.
    pub fn unload(&mut self) {
        if let Some(old) = self.installed.take() {
            info!(model = %old.id, "releasing model");
            old.model.release();
        }
    }

    /// Runs the model. `inputs` must carry exactly the declared input names.
    pub fn execute(&mut self, inputs: &TensorMap) -> Result<TensorMap, BrainError> {
        let installed = self
            .installed
            .as_mut()
            .ok_or(BrainError::Unavailable(UnavailableReason::NoModel))?;
        let handle = installed.model.handle_mut();

        bind_inputs(handle.input_signature(), inputs)?;

        let mut produced = handle
            .execute(inputs)
            .map_err(BrainError::from)?;

        let mut outputs = TensorMap::with_capacity(handle.output_signature().len());
        for spec in handle.output_signature() {
            let tensor = produced.remove(&spec.name).ok_or_else(|| {
                BrainError::Execution(format!("model did not produce output '{}'", spec.name))
            })?;
            if tensor.kind() != spec.element_kind
                || !spec.accepts_shape(&tensor.shape)
                || !tensor.is_consistent()
            {
                return Err(BrainError::Execution(format!(
                    "output '{}' has shape {:?} ({:?}), declared {} ({:?})",
                    spec.name,
                    tensor.shape,
                    tensor.kind(),
                    spec.shape_display(),
                    spec.element_kind
                )));
            }
            outputs.insert(spec.name.clone(), tensor);
        }
        if !produced.is_empty() {
            debug!(extra = produced.len(), "ignoring undeclared model outputs");
        }
        Ok(outputs)
    }
}

impl Drop for InferenceExecutor {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Checks that `inputs` matches `signature` by name, shape, kind and batch size.
fn bind_inputs(signature: &[TensorSpec], inputs: &TensorMap) -> Result<(), BrainError> {
    let declared: HashSet<&str> = signature.iter().map(|s| s.name.as_str()).collect();
    let provided: HashSet<&str> = inputs.keys().map(String::as_str).collect();
    if declared != provided {
        let mut missing: Vec<_> = declared.difference(&provided).collect();
        let mut extra: Vec<_> = provided.difference(&declared).collect();
        missing.sort();
        extra.sort();
        return Err(BrainError::Binding(format!(
            "input names do not match the model: missing {missing:?}, unexpected {extra:?}"
        )));
    }

    let mut batch: Option<usize> = None;
    for spec in signature {
        let tensor = &inputs[&spec.name];
        if tensor.kind() != spec.element_kind {
            return Err(BrainError::Binding(format!(
                "input '{}' is {:?}, model declares {:?}",
                spec.name,
                tensor.kind(),
                spec.element_kind
            )));
        }
        if !spec.accepts_shape(&tensor.shape) || !tensor.is_consistent() {
            return Err(BrainError::Binding(format!(
                "input '{}' has shape {:?}, model declares {}",
                spec.name,
                tensor.shape,
                spec.shape_display()
            )));
        }
        if spec.is_batched() {
            let n = tensor.batch_len();
            match batch {
                Some(b) if b != n => {
                    return Err(BrainError::Binding(format!(
                        "input '{}' has batch {n}, other inputs have {b}",
                        spec.name
                    )));
                }
                _ => batch = Some(n),
            }
        }
    }
    Ok(())
}
