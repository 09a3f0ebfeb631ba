//! App - アプリケーション層
//!
//! ports と pipeline を組み合わせて brain を構成します。
//!
//! # 主要コンポーネント
//! - **BrainBuilder**: 構築とワイヤリング（起動時検証つき）
//! - **BrainController**: decision tick と reload
//! - **SharedBrain**: Mutex で包んだ共有ハンドル
//! - **BrainConfig**: 設定
//! - **telemetry**: tracing subscriber の初期化

pub mod builder;
pub mod config;
pub mod controller;
pub mod shared;
pub mod telemetry;

pub use self::builder::{BrainBuilder, BuildError};
pub use self::config::{BrainConfig, ConfigError};
pub use self::controller::BrainController;
pub use self::shared::SharedBrain;
pub use self::telemetry::{InitError, init_tracing};
