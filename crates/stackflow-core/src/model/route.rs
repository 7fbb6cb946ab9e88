//! ルーティング条件

use serde::{Deserialize, Serialize};

/// リスナールールのマッチ条件
///
/// 1つの条件は複数のパターンを持ち、いずれかに一致すればマッチします。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "values", rename_all = "kebab-case")]
pub enum RouteCondition {
    /// パスパターン (例: "/api*")
    PathPattern(Vec<String>),
    /// Host ヘッダー (例: "site.example.com")
    HostHeader(Vec<String>),
}

impl RouteCondition {
    pub fn path(pattern: impl Into<String>) -> Self {
        Self::PathPattern(vec![pattern.into()])
    }

    pub fn host(pattern: impl Into<String>) -> Self {
        Self::HostHeader(vec![pattern.into()])
    }

    /// ロードバランサーAPIでのフィールド名
    pub fn field(&self) -> &'static str {
        match self {
            Self::PathPattern(_) => "path-pattern",
            Self::HostHeader(_) => "host-header",
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            Self::PathPattern(values) | Self::HostHeader(values) => values,
        }
    }
}

impl std::fmt::Display for RouteCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.field(), self.values().join(","))
    }
}
