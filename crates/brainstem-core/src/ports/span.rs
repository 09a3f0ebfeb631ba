//! SpanHook port - パイプライン各段の計測フック
//!
//! Controller は generate / execute / apply をそれぞれ tracing の span で囲み、
//! 経過時間をこのフックに渡します。タイマーの実装は外部に任せます。

use std::sync::Mutex;
use std::time::Duration;

/// Stage names reported to the hook.
pub mod stage {
    pub const GENERATE: &str = "generate";
    pub const EXECUTE: &str = "execute";
    pub const APPLY: &str = "apply";
}

pub trait SpanHook: Send + Sync {
    fn record(&self, name: &'static str, elapsed: Duration);
}

/// 何もしない
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpanHook;

impl SpanHook for NoopSpanHook {
    fn record(&self, _name: &'static str, _elapsed: Duration) {}
}

/// 記録したスパン名を順に保持する（テスト用）
#[derive(Debug, Default)]
pub struct RecordingSpanHook {
    spans: Mutex<Vec<&'static str>>,
}

impl RecordingSpanHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.spans
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl SpanHook for RecordingSpanHook {
    fn record(&self, name: &'static str, _elapsed: Duration) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(name);
        }
    }
}
