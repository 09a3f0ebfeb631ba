//! Errors - エラー型と分類
//!
//! # 分類（ErrorKind）
//! - Configuration: モデルと仕様が合わない。そのロードは失敗し、brain は Unloaded のまま
//! - Binding: テンソルの名前・形状の不一致、または実行エラー。その tick だけが失敗
//! - Decode: 出力テンソルを解釈できない。その tick だけが失敗
//! - Unavailable: モデル未ロード、リモート接続中。失敗ではなく正当なスキップ

use std::fmt;

use thiserror::Error;

use super::violation::CompatibilityViolation;

/// 運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Binding,
    Decode,
    Unavailable,
}

impl ErrorKind {
    /// Whether the error aborts the current tick (and only that tick).
    pub fn is_tick_fatal(self) -> bool {
        matches!(self, ErrorKind::Binding | ErrorKind::Decode)
    }
}

/// Why local inference was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    NoModel,
    RemoteActive,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NoModel => write!(f, "no model available"),
            UnavailableReason::RemoteActive => write!(f, "remote channel is active"),
        }
    }
}

/// BrainError はパイプライン全体のエラー
#[derive(Debug, Error)]
pub enum BrainError {
    #[error("model is incompatible with the observation spec: {}", summarize(.0))]
    Configuration(Vec<CompatibilityViolation>),

    #[error("model load failed: {0}")]
    Load(String),

    #[error("tensor binding failed: {0}")]
    Binding(String),

    #[error("inference execution failed: {0}")]
    Execution(String),

    #[error("output decode failed: {0}")]
    Decode(String),

    #[error("inference unavailable: {0}")]
    Unavailable(UnavailableReason),
}

impl BrainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrainError::Configuration(_) | BrainError::Load(_) => ErrorKind::Configuration,
            BrainError::Binding(_) | BrainError::Execution(_) => ErrorKind::Binding,
            BrainError::Decode(_) => ErrorKind::Decode,
            BrainError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    pub fn violations(&self) -> &[CompatibilityViolation] {
        match self {
            BrainError::Configuration(v) => v,
            _ => &[],
        }
    }
}

fn summarize(violations: &[CompatibilityViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
