//! Agent-declared contract: observation layout and action space.
//!
//! These are set once at configuration time. A loaded model is validated
//! against them, so they must not change while that model stays loaded.

use serde::{Deserialize, Serialize};

/// Shape of one camera / sensor observation (height, width, channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl VisualShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the agent can do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSpace {
    /// Width of the continuous action vector (0 = none).
    #[serde(default)]
    pub continuous_size: usize,

    /// Number of choices per discrete branch, in branch order.
    #[serde(default)]
    pub discrete_branch_sizes: Vec<usize>,
}

impl ActionSpace {
    pub fn continuous(size: usize) -> Self {
        Self {
            continuous_size: size,
            discrete_branch_sizes: Vec::new(),
        }
    }

    pub fn discrete(branches: Vec<usize>) -> Self {
        Self {
            continuous_size: 0,
            discrete_branch_sizes: branches,
        }
    }

    pub fn has_discrete(&self) -> bool {
        !self.discrete_branch_sizes.is_empty()
    }

    /// Total width of the concatenated action mask.
    pub fn mask_width(&self) -> usize {
        self.discrete_branch_sizes.iter().sum()
    }
}

/// What an agent observes and how it acts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservationSpec {
    /// Length of one vector observation.
    #[serde(default)]
    pub vector_observation_size: usize,

    /// Number of stacked vector observations (current + history), at least 1.
    #[serde(default = "default_stacks")]
    pub num_stacked_vector_observations: usize,

    /// Camera / sensor shapes in declared order.
    #[serde(default)]
    pub visual_observation_shapes: Vec<VisualShape>,

    #[serde(default)]
    pub action_space: ActionSpace,
}

fn default_stacks() -> usize {
    1
}

impl ObservationSpec {
    pub fn vector(size: usize, action_space: ActionSpace) -> Self {
        Self {
            vector_observation_size: size,
            num_stacked_vector_observations: 1,
            visual_observation_shapes: Vec::new(),
            action_space,
        }
    }

    pub fn with_stacks(mut self, stacks: usize) -> Self {
        self.num_stacked_vector_observations = stacks;
        self
    }

    pub fn with_visual(mut self, shape: VisualShape) -> Self {
        self.visual_observation_shapes.push(shape);
        self
    }

    /// Width of the stacked vector-observation row fed to the model.
    pub fn stacked_vector_width(&self) -> usize {
        self.vector_observation_size * self.num_stacked_vector_observations.max(1)
    }

    /// How many past observations are retained per agent.
    pub fn history_len(&self) -> usize {
        self.num_stacked_vector_observations.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_width_multiplies_size_and_stacks() {
        let spec = ObservationSpec::vector(8, ActionSpace::continuous(2)).with_stacks(3);
        assert_eq!(spec.stacked_vector_width(), 24);
        assert_eq!(spec.history_len(), 2);
    }

    #[test]
    fn spec_without_optional_fields_then_get_defaults() {
        let json = r#"
        {
          "vector_observation_size": 4,
          "action_space": { "discrete_branch_sizes": [3, 2] }
        }"#;
        let spec: ObservationSpec = serde_json::from_str(json).expect("deserialize");
        assert_eq!(spec.num_stacked_vector_observations, 1);
        assert!(spec.visual_observation_shapes.is_empty());
        assert_eq!(spec.action_space.continuous_size, 0);
        assert_eq!(spec.action_space.mask_width(), 5);
    }
}
