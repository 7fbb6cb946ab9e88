//! モデル定義
//!
//! StackFlowで使用されるデータモデルを定義します。

mod route;
mod service;
mod stack;

// Re-exports
pub use route::*;
pub use service::*;
pub use stack::*;
