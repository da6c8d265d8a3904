//! Wasp - Rust 编码智能体核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 单轮编排循环（Agent）与错误类型
//! - **driver**: 交互式多轮自治循环、启发式、环境快照、工具预算
//! - **llm**: 后端适配层（Anthropic / OpenAI 兼容 / Ollama / Mock）
//! - **memory**: 追加式回合日志与单轮值类型
//! - **permissions**: 工具权限策略引擎（yolo / 黑白名单 / 删除保护）
//! - **tools**: 工具注册表、调度器与示例工具

pub mod config;
pub mod core;
pub mod driver;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod permissions;
pub mod tools;

pub use crate::core::{Agent, AgentResponse};
