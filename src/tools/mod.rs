//! 工具层：注册表、调度器与示例工具
//!
//! 实际工具集（文件读写、搜索等）由宿主按 Tool trait 接入；
//! 这里只带 echo 与权限门控的 shell 两个薄实现。

pub mod dispatcher;
pub mod echo;
pub mod registry;
pub mod shell;

pub use dispatcher::ToolDispatcher;
pub use echo::EchoTool;
pub use registry::{ParameterSpec, Tool, ToolRegistry, ToolSchema};
pub use shell::ShellTool;
