use std::path::PathBuf;
use thiserror::Error;

/// 設定の読み込み・展開・パースで起きるエラー
#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDL の構文エラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("I/O エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("ファイルを読み込めません: {path}\n理由: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ディレクトリを走査できません: {path}\n理由: {source}")]
    WalkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("テンプレートエラー: {file}\n理由: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("テンプレート展開エラー: {0}")]
    TemplateRenderError(String),

    #[error(
        "stack.kdl が見つかりません\n探索開始位置: {0}\nヒント: stack.kdl を置いたディレクトリ（またはその配下）で実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("スタック名が空です。stack \"名前\" を定義してください")]
    EmptyStackName,

    #[error("ステージ '{stage}' は定義されていません (定義済み: {available})")]
    StageNotFound { stage: String, available: String },

    #[error("サービス '{0}' に image または asset が指定されていません")]
    MissingImage(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
