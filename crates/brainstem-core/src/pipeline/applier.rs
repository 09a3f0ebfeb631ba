//! TensorApplier - モデル出力を agent ごとのアクションに戻す
//!
//! 出力テンソルの行 i は batch の agent i に対応します。
//! 1 つでも形状が合わない出力があれば、その tick の適用は全体として中止し、
//! 途中まで組み立てたアクションは捨てます（部分適用しない）。
//!
//! 処理順は役割順（continuous → discrete 0..k → value → recurrent）で固定です。
//! sampling は複製した RNG で行い、全出力の解釈が成功したときだけ書き戻します。
//! 中止した tick は乱数を消費しません。

use tracing::debug;

use crate::domain::names::{self, OutputRole};
use crate::domain::{ActionSpace, AgentAction, AgentBatch, BrainError, ElementKind, TensorProxy};
use crate::pipeline::sampler::{ActionSampler, DiscretePolicy};
use crate::ports::TensorMap;

#[derive(Debug, Clone)]
pub struct TensorApplier {
    action_space: ActionSpace,
    sampler: ActionSampler,
}

impl TensorApplier {
    pub fn new(action_space: ActionSpace, policy: DiscretePolicy, seed: u64) -> Self {
        Self {
            action_space,
            sampler: ActionSampler::new(policy, seed),
        }
    }

    /// Decodes `outputs` into one action per agent, in batch order.
    pub fn apply(&mut self, outputs: &TensorMap, batch: &AgentBatch) -> Result<Vec<AgentAction>, BrainError> {
        let n = batch.len();
        let mut sampler = self.sampler.clone();
        let mut actions: Vec<AgentAction> = batch.ids().map(AgentAction::empty).collect();

        for name in outputs.keys() {
            if OutputRole::of(name).is_none() {
                debug!(output = %name, "output has no decoder, ignoring");
            }
        }

        let continuous_size = self.action_space.continuous_size;
        if continuous_size > 0 {
            let tensor = required(outputs, names::CONTINUOUS_ACTIONS)?;
            check_rows(tensor, n, continuous_size)?;
            for (i, action) in actions.iter_mut().enumerate() {
                action.continuous = tensor.row_f32(i);
            }
        }

        for (branch, &size) in self.action_space.discrete_branch_sizes.iter().enumerate() {
            let name = names::discrete_actions(branch);
            let tensor = required(outputs, &name)?;
            let direct = tensor.kind() == ElementKind::Int && tensor.row_width() == 1;
            if direct {
                check_rows(tensor, n, 1)?;
            } else {
                check_rows(tensor, n, size)?;
            }
            for (i, action) in actions.iter_mut().enumerate() {
                let row = tensor.row_f32(i);
                let index = if direct {
                    let index = row[0] as i64;
                    if index < 0 || index >= size as i64 {
                        return Err(BrainError::Decode(format!(
                            "'{name}' row {i} holds index {index}, branch has {size} actions"
                        )));
                    }
                    index as usize
                } else {
                    sampler.select(&row).ok_or_else(|| {
                        BrainError::Decode(format!("'{name}' row {i} has no finite logits"))
                    })?
                };
                action.discrete.push(index as i32);
            }
        }

        if let Some(tensor) = outputs.get(names::VALUE_ESTIMATE) {
            check_rows(tensor, n, 1)?;
            for (i, action) in actions.iter_mut().enumerate() {
                action.value_estimate = tensor.row_f32(i).first().copied();
            }
        }

        if let Some(tensor) = outputs.get(names::RECURRENT_OUT) {
            check_rows(tensor, n, tensor.row_width())?;
            for (i, action) in actions.iter_mut().enumerate() {
                action.memory = Some(tensor.row_f32(i));
            }
        }

        self.sampler = sampler;
        Ok(actions)
    }
}

fn required<'a>(outputs: &'a TensorMap, name: &str) -> Result<&'a TensorProxy, BrainError> {
    outputs
        .get(name)
        .ok_or_else(|| BrainError::Decode(format!("missing output '{name}'")))
}

fn check_rows(tensor: &TensorProxy, batch: usize, width: usize) -> Result<(), BrainError> {
    if tensor.batch_len() != batch {
        return Err(BrainError::Decode(format!(
            "output '{}' has {} rows for a batch of {batch}",
            tensor.name,
            tensor.batch_len()
        )));
    }
    if tensor.row_width() != width || !tensor.is_consistent() {
        return Err(BrainError::Decode(format!(
            "output '{}' rows have {} values, expected {width}",
            tensor.name,
            tensor.row_width()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentId, AgentRecord};
    use ulid::Ulid;

    fn batch(n: usize) -> AgentBatch {
        AgentBatch::new(
            (0..n)
                .map(|i| AgentRecord::new(AgentId::from_ulid(Ulid(i as u128 + 1)), vec![]))
                .collect(),
        )
    }

    fn map(tensors: Vec<TensorProxy>) -> TensorMap {
        tensors.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    #[test]
    fn continuous_rows_map_to_agents_in_order() {
        let mut applier = TensorApplier::new(ActionSpace::continuous(2), DiscretePolicy::Argmax, 0);
        let b = batch(3);
        let out = map(vec![TensorProxy::from_f32(
            "continuous_actions",
            vec![3, 2],
            vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1],
        )]);
        let actions = applier.apply(&out, &b).unwrap();
        assert_eq!(actions.len(), 3);
        for (i, (action, id)) in actions.iter().zip(b.ids()).enumerate() {
            assert_eq!(action.agent_id, id);
            assert_eq!(action.continuous, vec![i as f32, i as f32 + 0.1]);
        }
    }

    #[test]
    fn wrong_batch_rows_are_rejected() {
        let mut applier = TensorApplier::new(ActionSpace::continuous(1), DiscretePolicy::Argmax, 0);
        let out = map(vec![TensorProxy::from_f32("continuous_actions", vec![2, 1], vec![0.0; 2])]);
        let err = applier.apply(&out, &batch(3)).unwrap_err();
        assert!(matches!(err, BrainError::Decode(_)));
    }

    #[test]
    fn discrete_logits_use_argmax_policy() {
        let mut applier =
            TensorApplier::new(ActionSpace::discrete(vec![3, 2]), DiscretePolicy::Argmax, 0);
        let out = map(vec![
            TensorProxy::from_f32("discrete_actions_0", vec![2, 3], vec![0.0, 5.0, 1.0, 9.0, 0.0, 0.0]),
            TensorProxy::from_f32("discrete_actions_1", vec![2, 2], vec![0.0, 1.0, 1.0, 0.0]),
        ]);
        let actions = applier.apply(&out, &batch(2)).unwrap();
        assert_eq!(actions[0].discrete, vec![1, 1]);
        assert_eq!(actions[1].discrete, vec![0, 0]);
    }

    #[test]
    fn direct_indices_are_range_checked() {
        let mut applier = TensorApplier::new(ActionSpace::discrete(vec![3]), DiscretePolicy::Sample, 0);
        let ok = map(vec![TensorProxy::from_i32("discrete_actions_0", vec![2, 1], vec![2, 0])]);
        let actions = applier.apply(&ok, &batch(2)).unwrap();
        assert_eq!(actions[0].discrete, vec![2]);
        assert_eq!(actions[1].discrete, vec![0]);

        let bad = map(vec![TensorProxy::from_i32("discrete_actions_0", vec![2, 1], vec![2, 3])]);
        assert!(matches!(applier.apply(&bad, &batch(2)), Err(BrainError::Decode(_))));
    }

    #[test]
    fn auxiliary_outputs_are_attached() {
        let mut applier = TensorApplier::new(ActionSpace::continuous(1), DiscretePolicy::Argmax, 0);
        let out = map(vec![
            TensorProxy::from_f32("continuous_actions", vec![2, 1], vec![0.0, 0.0]),
            TensorProxy::from_f32("value_estimate", vec![2, 1], vec![0.25, 0.75]),
            TensorProxy::from_f32("recurrent_out", vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let actions = applier.apply(&out, &batch(2)).unwrap();
        assert_eq!(actions[1].value_estimate, Some(0.75));
        assert_eq!(actions[1].memory, Some(vec![3.0, 4.0]));
    }

    #[test]
    fn missing_action_output_is_a_decode_error() {
        let mut applier = TensorApplier::new(ActionSpace::continuous(1), DiscretePolicy::Argmax, 0);
        let err = applier.apply(&TensorMap::new(), &batch(1)).unwrap_err();
        assert!(err.to_string().contains("continuous_actions"));
    }

    #[test]
    fn aborted_apply_leaves_sampling_stream_untouched() {
        let space = ActionSpace::discrete(vec![4, 4]);
        let mut clean = TensorApplier::new(space.clone(), DiscretePolicy::Sample, 5);
        let mut aborted = TensorApplier::new(space, DiscretePolicy::Sample, 5);

        let bad = map(vec![
            TensorProxy::from_f32("discrete_actions_0", vec![2, 4], vec![0.0; 8]),
            TensorProxy::from_f32("discrete_actions_1", vec![3, 4], vec![0.0; 12]),
        ]);
        assert!(matches!(aborted.apply(&bad, &batch(2)), Err(BrainError::Decode(_))));

        let good = map(vec![
            TensorProxy::from_f32("discrete_actions_0", vec![2, 4], vec![0.0; 8]),
            TensorProxy::from_f32("discrete_actions_1", vec![2, 4], vec![0.0; 8]),
        ]);
        for _ in 0..8 {
            let expected: Vec<_> = clean.apply(&good, &batch(2)).unwrap().into_iter().map(|a| a.discrete).collect();
            let actual: Vec<_> = aborted.apply(&good, &batch(2)).unwrap().into_iter().map(|a| a.discrete).collect();
            assert_eq!(actual, expected);
        }
    }
}
