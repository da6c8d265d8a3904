//! 后端适配层抽象
//!
//! 三种互不兼容的线协议（Anthropic / OpenAI 兼容 / Ollama）统一为
//! send(turns, tools, system, params) -> BackendResponse；服务端错误归类为
//! BackendError 返回，适配器自身不向边界外抛出。

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::memory::{ToolCallRequest, Turn};
use crate::tools::ToolSchema;

/// 采样参数，各适配器按提供商字段映射
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// 后端传输错误分类
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Transient transport error: {0}")]
    Transient(String),

    #[error("Unknown backend error: {0}")]
    Unknown(String),
}

/// 规范化后端响应
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub text: String,
    /// 按后端返回顺序排列的工具调用请求
    pub tool_calls: Vec<ToolCallRequest>,
    /// 模型暴露的推理轨迹（仅部分后端提供）
    pub thinking: Option<String>,
    /// 原始响应体，便于排查
    pub raw: Value,
}

/// 后端客户端 trait：把规范化请求映射为提供商线格式并解出文本与工具调用
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        system: &str,
        params: &SamplingParams,
    ) -> Result<BackendResponse, BackendError>;

    fn provider(&self) -> &str;
}

/// 按 HTTP 状态码归类服务端错误
pub(crate) fn classify_status(status: u16, body: &str) -> BackendError {
    let detail = format!("HTTP {}: {}", status, body);
    match status {
        401 | 403 => BackendError::Auth(detail),
        429 => BackendError::RateLimit(detail),
        400..=499 => BackendError::BadRequest(detail),
        500..=599 => BackendError::Transient(detail),
        _ => BackendError::Unknown(detail),
    }
}

/// 归类 reqwest 传输层错误（非服务端响应）
pub(crate) fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() {
        BackendError::Transient(err.to_string())
    } else {
        BackendError::Unknown(err.to_string())
    }
}

/// 解码工具调用参数：原生对象与编码字符串都接受，失败时退回空参数集
pub(crate) fn decode_arguments(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}
