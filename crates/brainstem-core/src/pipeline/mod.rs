//! Pipeline - ローカル推論の各段
//!
//! 1 tick の流れ: Generator → Executor → Applier
//! 検証（Validator）はロード時に 1 回、Allocator は tick をまたいでバッファを再利用します。

pub mod allocator;
pub mod applier;
pub mod executor;
pub mod generator;
pub mod memory;
pub mod sampler;
pub mod validator;

pub use self::allocator::TensorAllocator;
pub use self::applier::TensorApplier;
pub use self::executor::InferenceExecutor;
pub use self::generator::TensorGenerator;
pub use self::memory::{AgentMemory, AgentMemoryStore};
pub use self::sampler::{ActionSampler, DiscretePolicy};
pub use self::validator::{ValidatedModel, certify, validate, validate_model};
