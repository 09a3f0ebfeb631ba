//! CompatibilityViolation - モデルとエージェント仕様の不整合
//!
//! Validator が返す純粋な値です。チェック呼び出しの外にライフサイクルはありません。

use std::fmt;

use serde::{Deserialize, Serialize};

/// One mismatch between the model signature and the declared spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityViolation {
    /// Tensor name (or spec field) the violation is about.
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl CompatibilityViolation {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CompatibilityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (expected {}, got {})",
            self.field, self.message, self.expected, self.actual
        )
    }
}
