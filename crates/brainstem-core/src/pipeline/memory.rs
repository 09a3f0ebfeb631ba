//! Per-agent state carried between ticks.
//!
//! Stacked observation history, the previous discrete action and recurrent
//! memory all live here, keyed by `AgentId`. The store is only written after a
//! tick succeeded end to end, and it is cleared whenever the model changes.

use std::collections::{HashMap, VecDeque};

use crate::domain::{AgentAction, AgentBatch, AgentId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentMemory {
    /// Past vector observations, oldest first.
    pub history: VecDeque<Vec<f32>>,
    pub previous_action: Option<Vec<i32>>,
    pub recurrent: Option<Vec<f32>>,
}

#[derive(Debug, Default)]
pub struct AgentMemoryStore {
    entries: HashMap<AgentId, AgentMemory>,
}

impl AgentMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentMemory> {
        self.entries.get(id)
    }

    /// Records a successful tick: pushes each agent's observation into its
    /// history (bounded by `history_len`) and stores the decided action.
    ///
    /// `actions` must be in batch order.
    pub fn commit(&mut self, batch: &AgentBatch, actions: &[AgentAction], history_len: usize) {
        for (agent, action) in batch.agents.iter().zip(actions) {
            let entry = self.entries.entry(agent.id).or_default();
            if history_len > 0 {
                entry.history.push_back(agent.vector_observation.clone());
                while entry.history.len() > history_len {
                    entry.history.pop_front();
                }
            }
            if !action.discrete.is_empty() {
                entry.previous_action = Some(action.discrete.clone());
            }
            if let Some(memory) = &action.memory {
                entry.recurrent = Some(memory.clone());
            }
        }
    }

    pub fn forget(&mut self, id: &AgentId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentRecord;
    use ulid::Ulid;

    fn agent(n: u128) -> AgentId {
        AgentId::from_ulid(Ulid(n))
    }

    #[test]
    fn history_is_bounded_and_oldest_first() {
        let mut store = AgentMemoryStore::new();
        let id = agent(1);
        for step in 0..4 {
            let batch = AgentBatch::new(vec![AgentRecord::new(id, vec![step as f32])]);
            store.commit(&batch, &[AgentAction::empty(id)], 2);
        }
        let history: Vec<_> = store.get(&id).unwrap().history.iter().cloned().collect();
        assert_eq!(history, vec![vec![2.0], vec![3.0]]);
    }

    #[test]
    fn commit_keeps_discrete_action_and_memory() {
        let mut store = AgentMemoryStore::new();
        let id = agent(7);
        let batch = AgentBatch::new(vec![AgentRecord::new(id, vec![])]);
        let mut action = AgentAction::empty(id);
        action.discrete = vec![2, 0];
        action.memory = Some(vec![0.5]);
        store.commit(&batch, &[action], 0);

        let mem = store.get(&id).unwrap();
        assert_eq!(mem.previous_action, Some(vec![2, 0]));
        assert_eq!(mem.recurrent, Some(vec![0.5]));
        assert!(mem.history.is_empty());

        assert!(store.forget(&id));
        assert!(store.is_empty());
    }
}
