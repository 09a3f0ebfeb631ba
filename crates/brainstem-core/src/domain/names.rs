//! Tensor names recognized by the pipeline.
//!
//! Names are whatever the model-authoring toolchain emits; these are the
//! conventions this crate binds by.

pub const VECTOR_OBSERVATION: &str = "vector_obs";
pub const VISUAL_OBSERVATION_PREFIX: &str = "visual_obs_";
pub const PREVIOUS_ACTION: &str = "prev_action";
pub const ACTION_MASK: &str = "action_masks";
pub const EPSILON: &str = "epsilon";
pub const RECURRENT_IN: &str = "recurrent_in";
pub const BATCH_SIZE: &str = "batch_size";
pub const SEQUENCE_LENGTH: &str = "sequence_length";

pub const CONTINUOUS_ACTIONS: &str = "continuous_actions";
pub const DISCRETE_ACTIONS_PREFIX: &str = "discrete_actions_";
pub const VALUE_ESTIMATE: &str = "value_estimate";
pub const RECURRENT_OUT: &str = "recurrent_out";

/// Model API version this pipeline understands.
pub const SUPPORTED_API_VERSION: u32 = 2;

pub fn visual_observation(index: usize) -> String {
    format!("{VISUAL_OBSERVATION_PREFIX}{index}")
}

pub fn discrete_actions(branch: usize) -> String {
    format!("{DISCRETE_ACTIONS_PREFIX}{branch}")
}

/// Semantic role of a model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    VectorObservation,
    VisualObservation(usize),
    PreviousAction,
    ActionMask,
    Epsilon,
    RecurrentIn,
    BatchSize,
    SequenceLength,
}

impl InputRole {
    pub fn of(name: &str) -> Option<Self> {
        match name {
            VECTOR_OBSERVATION => Some(InputRole::VectorObservation),
            PREVIOUS_ACTION => Some(InputRole::PreviousAction),
            ACTION_MASK => Some(InputRole::ActionMask),
            EPSILON => Some(InputRole::Epsilon),
            RECURRENT_IN => Some(InputRole::RecurrentIn),
            BATCH_SIZE => Some(InputRole::BatchSize),
            SEQUENCE_LENGTH => Some(InputRole::SequenceLength),
            _ => indexed(name, VISUAL_OBSERVATION_PREFIX).map(InputRole::VisualObservation),
        }
    }
}

/// Semantic role of a model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRole {
    ContinuousActions,
    DiscreteActions(usize),
    ValueEstimate,
    RecurrentOut,
}

impl OutputRole {
    pub fn of(name: &str) -> Option<Self> {
        match name {
            CONTINUOUS_ACTIONS => Some(OutputRole::ContinuousActions),
            VALUE_ESTIMATE => Some(OutputRole::ValueEstimate),
            RECURRENT_OUT => Some(OutputRole::RecurrentOut),
            _ => indexed(name, DISCRETE_ACTIONS_PREFIX).map(OutputRole::DiscreteActions),
        }
    }
}

fn indexed(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}
