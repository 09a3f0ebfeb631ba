//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **DenseModelLoader / DenseModel**: CPU で動く線形モデル（JSON 定義）
//! - **InMemoryRemoteChannel**: 開発用のリモートチャネル
//!
//! 本番の推論エンジン（GPU ランタイムなど）は `ModelLoader` を実装した別クレートに置きます。

pub mod dense;
pub mod inmem_remote;

pub use self::dense::{Activation, DenseHead, DenseModel, DenseModelDef, DenseModelLoader, LoaderStats};
pub use self::inmem_remote::InMemoryRemoteChannel;
