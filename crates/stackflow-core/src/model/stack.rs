//! スタック定義
//!
//! stack.kdl 全体をパースした結果。ステージ指定時はステージ固有の
//! サービス・タグ・ドメインが適用済みです。

use super::service::ServiceSpec;
use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};

/// 未指定時のアベイラビリティゾーン数（リソースクォータ対策で2に制限）
pub const DEFAULT_MAX_AZS: u8 = 2;

/// ALB は2つ以上のAZ（サブネット）を必要とする
pub const MIN_AZS: u8 = 2;

/// /16 の VPC を /20 のサブネットに分けられる上限
pub const MAX_AZS: u8 = 16;

/// デプロイ先のアカウントとリージョン
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnvironment {
    pub region: Option<String>,
    pub account: Option<String>,
}

/// ネットワーク（VPC）の扱い
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum NetworkConfig {
    /// スタック内でVPCを作成
    Create { max_azs: u8 },
    /// 既存のVPCを使用
    Import { vpc_id: String, subnet_ids: Vec<String> },
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::Create {
            max_azs: DEFAULT_MAX_AZS,
        }
    }
}

/// Route 53 に登録するドメイン設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// ホストゾーンのドメイン名 (例: "example.com")
    pub domain_name: String,
    /// CNAMEを作成するサブドメイン (例: "site")
    pub subdomain_name: String,
    /// 証明書ARN、またはACMの証明書ID
    pub certificate: String,
}

impl DomainConfig {
    /// サブドメインを含む完全なドメイン名
    pub fn fqdn(&self) -> String {
        join_fqdn(&self.subdomain_name, &self.domain_name)
    }
}

/// `subdomain.domain`。サブドメインが空ならドメインそのもの
pub fn join_fqdn(subdomain_name: &str, domain_name: &str) -> String {
    if subdomain_name.is_empty() {
        domain_name.to_string()
    } else {
        format!("{}.{}", subdomain_name, domain_name)
    }
}

/// リソースに付与するタグ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 同名タグは値を置き換え、新規タグは末尾に追加
pub fn upsert_tag(tags: &mut Vec<Tag>, tag: Tag) {
    if let Some(existing) = tags.iter_mut().find(|t| t.name == tag.name) {
        existing.value = tag.value;
    } else {
        tags.push(tag);
    }
}

/// スタック定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDefinition {
    /// アプリケーション名（全リソース名のプレフィックス）
    pub name: String,
    /// 適用済みのステージ
    pub stage: Option<String>,
    pub environment: StackEnvironment,
    pub network: NetworkConfig,
    pub domain: Option<DomainConfig>,
    pub tags: Vec<Tag>,
    /// 宣言順のサービス一覧（ルール優先度は宣言順で決まる）
    pub services: Vec<ServiceSpec>,
    /// 定義されている全ステージ名
    pub stages: Vec<String>,
}

impl StackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: None,
            environment: StackEnvironment::default(),
            network: NetworkConfig::default(),
            domain: None,
            tags: Vec::new(),
            services: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// デプロイ時のスタック名 (`{name}-{stage}`)
    pub fn stack_name(&self) -> String {
        match &self.stage {
            Some(stage) => format!("{}-{}", self.name, stage),
            None => self.name.clone(),
        }
    }

    pub fn service(&self, id: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.id == id)
    }

    /// マージ完了後の必須項目を検証
    ///
    /// ルーティング上の整合性（ID重複、優先度など）はプラン構築時に検証されます。
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StackError::EmptyStackName);
        }
        if let Some(service) = self.services.iter().find(|s| s.image.is_none()) {
            return Err(StackError::MissingImage(service.id.clone()));
        }
        Ok(())
    }
}
