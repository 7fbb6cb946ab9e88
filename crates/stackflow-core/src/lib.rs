//! StackFlow のコア機能
//!
//! KDL で記述されたスタック定義の読み込み、テンプレート展開、
//! ステージごとの上書き適用を担当する。

pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

pub use discovery::{DiscoveredFiles, discover_files, discover_files_with_stage, find_project_root};
pub use error::*;
pub use loader::{load_project, load_project_from_root, load_project_from_root_with_stage};
pub use model::*;
pub use parser::*;
pub use template::{TemplateProcessor, Variables};
