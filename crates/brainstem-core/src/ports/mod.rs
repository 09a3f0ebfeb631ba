//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。
//! 推論エンジン、リモートチャネル、計測フック、時刻、ID 生成を
//! trait として切り出し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod model;
pub mod remote;
pub mod span;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::model::{
    ExecuteError, InferenceDevice, LoadError, ModelHandle, ModelLoader, ModelMetadata, ModelRef,
    TensorMap,
};
pub use self::remote::{ChannelError, RemoteChannel};
pub use self::span::{NoopSpanHook, RecordingSpanHook, SpanHook};
