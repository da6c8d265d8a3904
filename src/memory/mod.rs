//! 会话状态：追加式回合日志与单轮值类型

pub mod conversation;

pub use conversation::{ContentBlock, Role, ToolCallRequest, ToolCallResult, Turn, TurnLog};
