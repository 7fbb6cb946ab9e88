pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "STACKFLOW_CONFIG_PATH";

const CONFIG_FILE: &str = "config.yaml";

/// synth の出力先（未設定時）
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

/// ユーザー設定 (~/.config/stackflow/config.yaml)
///
/// stack.kdl に region / account が無い場合の既定値として使われる
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_region: Option<String>,
    pub default_account: Option<String>,
    pub default_stage: Option<String>,
    pub out_dir: Option<PathBuf>,
}

impl Settings {
    /// synth の出力先
    pub fn out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
    }

    /// ファイルから読み込み
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// StackFlowの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// 設定ファイルのパス
///
/// 1. 環境変数 STACKFLOW_CONFIG_PATH (直接パス指定)
/// 2. ~/.config/stackflow/config.yaml
pub fn config_file_path() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(config_path));
    }

    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// ユーザー設定を読み込む。ファイルが無ければ既定値
pub fn load_settings() -> Result<Settings> {
    let path = config_file_path()?;
    if !path.exists() {
        debug!(path = %path.display(), "Settings file not found, using defaults");
        return Ok(Settings::default());
    }

    debug!(path = %path.display(), "Loading settings");
    Settings::load_from(&path)
}
