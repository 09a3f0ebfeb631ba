//! Domain model (ids, tensors, specs, agents, errors, state).

pub mod agent;
pub mod errors;
pub mod ids;
pub mod names;
pub mod spec;
pub mod state;
pub mod tensor;
pub mod violation;

pub use self::agent::{AgentAction, AgentBatch, AgentRecord, VisualObservation};
pub use self::errors::{BrainError, ErrorKind, UnavailableReason};
pub use self::ids::{AgentId, ModelId};
pub use self::spec::{ActionSpace, ObservationSpec, VisualShape};
pub use self::state::{BrainState, TickOutcome};
pub use self::tensor::{Dim, ElementKind, TensorData, TensorProxy, TensorSpec};
pub use self::violation::CompatibilityViolation;
