//! SGEO 构造脚本文件格式
//!
//! 支持：
//! - `.sgs` 文本脚本（版本头 + 每行一个操作码）
//! - `.json` 脚本
//! - `.sgeo` 原生格式（MessagePack + Zstd）

pub mod error;
pub mod format;
pub mod native;
pub mod script;

pub use error::FileError;
pub use format::{load, save, ScriptFormat};
pub use script::{ConstructionScript, ScriptMetadata, SCRIPT_VERSION};
