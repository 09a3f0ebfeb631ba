//! TensorGenerator - agent batch からモデル入力を組み立てる
//!
//! # フロー
//! 1. 入力 signature の各 TensorSpec を名前から役割に分類
//! 2. TensorAllocator からバッファを取得（batch 軸は agent 数に束縛）
//! 3. agent i の値を行 i に書き込む
//!
//! どこかで失敗したら、それまでに確保したバッファを返却してから
//! BrainError::Binding を返します。部分的な入力は決して外に出しません。

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::domain::names::InputRole;
use crate::domain::{AgentBatch, BrainError, ElementKind, ObservationSpec, TensorProxy, TensorSpec};
use crate::pipeline::allocator::TensorAllocator;
use crate::pipeline::memory::AgentMemoryStore;
use crate::ports::TensorMap;

/// Builds input tensors for one tick.
#[derive(Debug, Clone)]
pub struct TensorGenerator {
    spec: ObservationSpec,
    seed: u64,
}

impl TensorGenerator {
    pub fn new(spec: ObservationSpec, seed: u64) -> Self {
        Self { spec, seed }
    }

    pub fn spec(&self) -> &ObservationSpec {
        &self.spec
    }

    /// Produces one tensor per entry of `signature`, keyed by name.
    pub fn generate(
        &self,
        signature: &[TensorSpec],
        batch: &AgentBatch,
        memory: &AgentMemoryStore,
        allocator: &mut TensorAllocator,
    ) -> Result<TensorMap, BrainError> {
        let mut tensors = TensorMap::with_capacity(signature.len());
        for input in signature {
            let mut tensor = allocator.alloc(&input.name, input.bind(batch.len()), input.element_kind);
            if let Err(err) = self.fill(input, &mut tensor, batch, memory) {
                allocator.recycle(tensor);
                allocator.recycle_all(tensors);
                return Err(err);
            }
            tensors.insert(input.name.clone(), tensor);
        }
        Ok(tensors)
    }

    fn fill(
        &self,
        input: &TensorSpec,
        tensor: &mut TensorProxy,
        batch: &AgentBatch,
        memory: &AgentMemoryStore,
    ) -> Result<(), BrainError> {
        let role = InputRole::of(&input.name).ok_or_else(|| {
            BrainError::Binding(format!(
                "model requires input '{}' which the pipeline cannot supply",
                input.name
            ))
        })?;
        if input.is_batched() && tensor.batch_len() != batch.len() {
            return Err(BrainError::Binding(format!(
                "input '{}' bound to batch {} but the batch has {} agents",
                input.name,
                tensor.batch_len(),
                batch.len()
            )));
        }
        let width = tensor.row_width();

        match role {
            InputRole::VectorObservation => self.fill_vector(tensor, width, batch, memory),
            InputRole::VisualObservation(index) => fill_visual(tensor, width, index, batch),
            InputRole::PreviousAction => {
                for (row, agent) in batch.agents.iter().enumerate() {
                    let previous = memory.get(&agent.id).and_then(|m| m.previous_action.as_ref());
                    if let Some(previous) = previous {
                        write_row(tensor, row, width, previous.iter().map(|a| *a as f32))?;
                    }
                }
                Ok(())
            }
            InputRole::ActionMask => {
                for (row, agent) in batch.agents.iter().enumerate() {
                    match &agent.action_mask {
                        Some(mask) if mask.len() != width => {
                            return Err(BrainError::Binding(format!(
                                "agent {} action mask has {} entries, expected {}",
                                agent.id,
                                mask.len(),
                                width
                            )));
                        }
                        Some(mask) => {
                            write_row(tensor, row, width, mask.iter().map(|&ok| if ok { 1.0 } else { 0.0 }))?
                        }
                        None => write_row(tensor, row, width, std::iter::repeat_n(1.0, width))?,
                    }
                }
                Ok(())
            }
            InputRole::Epsilon => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                rng.set_stream(batch.step);
                for i in 0..tensor.data.len() {
                    let sample: f32 = rng.sample(StandardNormal);
                    tensor.data.set_f32(i, sample);
                }
                Ok(())
            }
            InputRole::RecurrentIn => {
                for (row, agent) in batch.agents.iter().enumerate() {
                    let stored = memory.get(&agent.id).and_then(|m| m.recurrent.as_ref());
                    if let Some(stored) = stored {
                        if stored.len() != width {
                            return Err(BrainError::Binding(format!(
                                "agent {} recurrent memory has {} values, expected {}",
                                agent.id,
                                stored.len(),
                                width
                            )));
                        }
                        write_row(tensor, row, width, stored.iter().copied())?;
                    }
                }
                Ok(())
            }
            InputRole::BatchSize => fill_scalar(tensor, batch.len() as f32),
            InputRole::SequenceLength => fill_scalar(tensor, 1.0),
        }
    }

    /// Row layout: `[h_oldest, ..., h_newest, current]`, zero-padded at the
    /// front when an agent has less history than the stack depth.
    fn fill_vector(
        &self,
        tensor: &mut TensorProxy,
        width: usize,
        batch: &AgentBatch,
        memory: &AgentMemoryStore,
    ) -> Result<(), BrainError> {
        let size = self.spec.vector_observation_size;
        let history_len = self.spec.history_len();
        if width != self.spec.stacked_vector_width() {
            return Err(BrainError::Binding(format!(
                "'{}' row width {} does not match stacked observation width {}",
                tensor.name,
                width,
                self.spec.stacked_vector_width()
            )));
        }
        for (row, agent) in batch.agents.iter().enumerate() {
            if agent.vector_observation.len() != size {
                return Err(BrainError::Binding(format!(
                    "agent {} vector observation has {} values, expected {}",
                    agent.id,
                    agent.vector_observation.len(),
                    size
                )));
            }
            let history: Vec<&Vec<f32>> = memory
                .get(&agent.id)
                .map(|m| m.history.iter().rev().take(history_len).rev().collect())
                .unwrap_or_default();
            let padding = history_len - history.len();
            let values = std::iter::repeat_n(0.0, padding * size)
                .chain(history.into_iter().flatten().copied())
                .chain(agent.vector_observation.iter().copied());
            write_row(tensor, row, width, values)?;
        }
        Ok(())
    }
}

fn fill_visual(
    tensor: &mut TensorProxy,
    width: usize,
    index: usize,
    batch: &AgentBatch,
) -> Result<(), BrainError> {
    if tensor.shape.len() != 4 {
        return Err(BrainError::Binding(format!(
            "visual input '{}' has shape {:?}, expected [N, H, W, C]",
            tensor.name, tensor.shape
        )));
    }
    let declared = tensor.shape[1..].to_vec();
    let int_pixels = tensor.kind() == ElementKind::Int;
    for (row, agent) in batch.agents.iter().enumerate() {
        let obs = agent.visual_observations.get(index).ok_or_else(|| {
            BrainError::Binding(format!(
                "agent {} has no visual observation #{index} for '{}'",
                agent.id, tensor.name
            ))
        })?;
        let actual = [obs.shape.height, obs.shape.width, obs.shape.channels];
        if declared[..] != actual[..] || obs.data.len() != width {
            return Err(BrainError::Binding(format!(
                "agent {} visual observation #{index} is {:?} with {} values, '{}' expects {:?}",
                agent.id,
                actual,
                obs.data.len(),
                tensor.name,
                declared
            )));
        }
        let values = obs.data.iter().map(|&v| if int_pixels { v * 255.0 } else { v });
        write_row(tensor, row, width, values)?;
    }
    Ok(())
}

fn fill_scalar(tensor: &mut TensorProxy, value: f32) -> Result<(), BrainError> {
    if tensor.data.len() != 1 {
        return Err(BrainError::Binding(format!(
            "scalar input '{}' has {} elements",
            tensor.name,
            tensor.data.len()
        )));
    }
    tensor.data.set_f32(0, value);
    Ok(())
}

fn write_row(
    tensor: &mut TensorProxy,
    row: usize,
    width: usize,
    values: impl Iterator<Item = f32>,
) -> Result<(), BrainError> {
    let start = row * width;
    let mut written = 0;
    for value in values {
        if written == width {
            written += 1;
            break;
        }
        tensor.data.set_f32(start + written, value);
        written += 1;
    }
    if written != width {
        return Err(BrainError::Binding(format!(
            "row {row} of '{}' needs {width} values",
            tensor.name
        )));
    }
    Ok(())
}
