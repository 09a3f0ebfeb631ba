//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{AgentId, ModelId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は ULID ベースの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    /// ロードごとのモデル ID を生成
    fn generate_model_id(&self) -> ModelId;

    /// Agent ID を生成（環境側でキーを持たない場合）
    fn generate_agent_id(&self) -> AgentId;
}

/// UlidGenerator は Clock の時刻で ULID を作る
///
/// テスト時に FixedClock を使うと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_model_id(&self) -> ModelId {
        ModelId::from(self.next_ulid())
    }

    fn generate_agent_id(&self) -> AgentId {
        AgentId::from(self.next_ulid())
    }
}
