//! サービス定義

use super::route::RouteCondition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 未指定時のコンテナポート
pub const DEFAULT_CONTAINER_PORT: u32 = 80;

/// コンテナイメージの取得元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "source", rename_all = "lowercase")]
pub enum ImageSource {
    /// レジストリ上のイメージ (例: "amazon/amazon-ecs-sample")
    Registry(String),
    /// ビルドコンテキストのディレクトリ (例: "./app")
    Asset(PathBuf),
}

impl ImageSource {
    pub fn is_asset(&self) -> bool {
        matches!(self, Self::Asset(_))
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(reference) => write!(f, "{}", reference),
            Self::Asset(path) => write!(f, "asset:{}", path.display()),
        }
    }
}

/// デプロイ単位となるサービス定義
///
/// `id` から派生リソース名（タスク定義、ターゲットグループなど）が決まるため、
/// プラン内で一意である必要があります。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// サービスID（大文字小文字を区別）
    pub id: String,

    /// イメージの取得元（ステージでのマージ完了後に必須）
    pub image: Option<ImageSource>,

    /// コンテナがリッスンするポート
    #[serde(default = "default_container_port")]
    pub container_port: u32,

    /// 環境変数
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// ルーティング条件（空の場合はデフォルトターゲット）
    #[serde(default)]
    pub conditions: Vec<RouteCondition>,
}

fn default_container_port() -> u32 {
    DEFAULT_CONTAINER_PORT
}

impl ServiceSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: None,
            container_port: DEFAULT_CONTAINER_PORT,
            environment: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_port(mut self, port: u32) -> Self {
        self.container_port = port;
        self
    }

    pub fn with_condition(mut self, condition: RouteCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// ルーティング条件を持たないサービス（デフォルトターゲット候補）か
    pub fn is_default_target(&self) -> bool {
        self.conditions.is_empty()
    }
}
