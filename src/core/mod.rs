//! 核心编排层：单轮编排循环与错误类型

pub mod agent;
pub mod error;

pub use agent::{Agent, AgentResponse, ExecutedToolCall, FALLBACK_AFTER_TOOLS};
pub use error::AgentError;
