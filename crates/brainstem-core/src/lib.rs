//! brainstem-core
//!
//! Local batched inference for groups of agents that share one policy.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tensor, spec, agent, errors, state, names）
//! - **ports**: 抽象化レイヤー（ModelLoader, ModelHandle, RemoteChannel, SpanHook, Clock, IdGenerator）
//! - **pipeline**: 推論の各段（Allocator, Validator, Generator, Executor, Applier）
//! - **app**: 組み立てと tick 制御（BrainBuilder, BrainController, SharedBrain, config, telemetry）
//! - **impls**: ports の実装（DenseModelLoader, InMemoryRemoteChannel）

pub mod app;
pub mod domain;
pub mod impls;
pub mod pipeline;
pub mod ports;
