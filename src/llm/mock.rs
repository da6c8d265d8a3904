//! Mock 后端（用于测试，无需 API）
//!
//! 按脚本顺序弹出预置响应或错误，并记录每次请求携带的工具数，
//! 便于断言「二次调用不再提供工具」之类的契约。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::llm::traits::{Backend, BackendError, BackendResponse, SamplingParams};
use crate::memory::{ToolCallRequest, Turn};
use crate::tools::ToolSchema;

/// 脚本化 Mock 客户端
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Result<BackendResponse, BackendError>>>,
    /// 每次 send 时请求里携带的工具 schema 数
    tool_counts: Mutex<Vec<usize>>,
    /// 每次 send 时的回合数
    turn_counts: Mutex<Vec<usize>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(BackendResponse {
            text: text.into(),
            ..BackendResponse::default()
        }));
    }

    pub fn push_tool_call(&self, name: &str, arguments: Map<String, Value>) {
        let id = format!("call_{}", uuid::Uuid::new_v4());
        self.script.lock().unwrap().push_back(Ok(BackendResponse {
            tool_calls: vec![ToolCallRequest {
                id,
                name: name.to_string(),
                arguments,
            }],
            ..BackendResponse::default()
        }));
    }

    pub fn push_response(&self, response: BackendResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: BackendError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn tool_counts(&self) -> Vec<usize> {
        self.tool_counts.lock().unwrap().clone()
    }

    pub fn turn_counts(&self) -> Vec<usize> {
        self.turn_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn send(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        _system: &str,
        _params: &SamplingParams,
    ) -> Result<BackendResponse, BackendError> {
        self.tool_counts.lock().unwrap().push(tools.len());
        self.turn_counts.lock().unwrap().push(turns.len());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(BackendResponse {
                    text: "(mock: script exhausted)".to_string(),
                    ..BackendResponse::default()
                })
            })
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
