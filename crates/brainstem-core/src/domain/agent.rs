//! Agent records: what goes into a tick and what comes out of it.
//!
//! The batch order is the contract of the whole pipeline: row `i` of every
//! input tensor comes from `agents[i]`, and row `i` of every output tensor is
//! decoded back onto that same agent.

use serde::{Deserialize, Serialize};

use super::ids::AgentId;
use super::spec::VisualShape;

/// One rendered camera / sensor frame, row-major H×W×C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualObservation {
    pub shape: VisualShape,
    pub data: Vec<f32>,
}

impl VisualObservation {
    pub fn new(shape: VisualShape, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn filled(shape: VisualShape, value: f32) -> Self {
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }
}

/// The current observation of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,

    /// Current (unstacked) vector observation.
    #[serde(default)]
    pub vector_observation: Vec<f32>,

    /// One frame per declared visual shape, in declared order.
    #[serde(default)]
    pub visual_observations: Vec<VisualObservation>,

    /// Allowed actions, concatenated across discrete branches.
    /// `None` means every action is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_mask: Option<Vec<bool>>,
}

impl AgentRecord {
    pub fn new(id: AgentId, vector_observation: Vec<f32>) -> Self {
        Self {
            id,
            vector_observation,
            visual_observations: Vec::new(),
            action_mask: None,
        }
    }

    pub fn with_visual(mut self, observation: VisualObservation) -> Self {
        self.visual_observations.push(observation);
        self
    }

    pub fn with_action_mask(mut self, mask: Vec<bool>) -> Self {
        self.action_mask = Some(mask);
        self
    }
}

/// Ordered agents for one decision tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentBatch {
    pub agents: Vec<AgentRecord>,

    /// Monotonic decision step, used to key per-tick noise.
    #[serde(default)]
    pub step: u64,
}

impl AgentBatch {
    pub fn new(agents: Vec<AgentRecord>) -> Self {
        Self { agents, step: 0 }
    }

    pub fn at_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.iter().map(|a| a.id)
    }
}

/// The action decided for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub agent_id: AgentId,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub continuous: Vec<f32>,

    /// One chosen index per discrete branch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrete: Vec<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_estimate: Option<f32>,

    /// Recurrent state to feed back on the next tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<f32>>,
}

impl AgentAction {
    pub fn empty(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            continuous: Vec::new(),
            discrete: Vec::new(),
            value_estimate: None,
            memory: None,
        }
    }

    /// All-zero action: what an agent does before its first decision.
    pub fn no_op(agent_id: AgentId, continuous_size: usize, branches: usize) -> Self {
        Self {
            agent_id,
            continuous: vec![0.0; continuous_size],
            discrete: vec![0; branches],
            value_estimate: None,
            memory: None,
        }
    }
}
