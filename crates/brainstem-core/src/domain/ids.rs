//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + Phantom type
//! Agent と Model のハンドルはどちらも ULID で識別します。
//! `Id<T>` というジェネリック型で共通実装を提供し、
//! `T` はマーカー型（PhantomData）としてコンパイル時にだけ使います。
//!
//! - `AgentId`: 環境側から渡される agent の識別キー
//! - `ModelId`: ロードごとに払い出されるモデルハンドルの識別子
//!
//! ModelId はロードのたびに新しく発行されるので、
//! 同じモデル参照を再ロードしても別のハンドルとして扱われます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"agent-", "model-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let agent: AgentId = Id::from(Ulid::new());
/// let model: ModelId = Id::from(Ulid::new());
/// // agent と model は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Agent のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agent {}

impl IdMarker for Agent {
    fn prefix() -> &'static str {
        "agent-"
    }
}

/// Model のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Model {}

impl IdMarker for Model {
    fn prefix() -> &'static str {
        "model-"
    }
}

/// Identity key of an agent inside a batch.
pub type AgentId = Id<Agent>;

/// Identifier of one loaded model handle (fresh on every load).
pub type ModelId = Id<Model>;
