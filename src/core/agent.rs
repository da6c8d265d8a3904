//! 编排循环
//!
//! 单轮流程：追加用户回合 -> 后端调用 -> （可选）按返回顺序串行执行工具并二次调用 ->
//! 聚合为 AgentResponse。后端错误按类别转为文本响应；chat 永不向调用方抛错，
//! 会话表层总能渲染出内容。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::llm::{Backend, BackendError, BackendResponse, SamplingParams};
use crate::memory::{Turn, TurnLog};
use crate::permissions::PermissionEngine;
use crate::tools::{EchoTool, ShellTool, Tool, ToolDispatcher, ToolRegistry, ToolSchema};

/// 二次调用没给出文本结论时的固定回退消息
pub const FALLBACK_AFTER_TOOLS: &str =
    "Error: Failed to execute tool calls. Please try a different query.";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding agent. You solve the user's task step \
by step, using the available tools when they are necessary and answering directly when they \
are not. Follow the tool call schema exactly and provide all required parameters.";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

/// 单次工具调用及其结果（按后端返回顺序）
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedToolCall {
    pub name: String,
    pub parameters: Map<String, Value>,
    pub result: String,
}

/// 一轮编排的聚合结果
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    pub message: String,
    pub tool_calls: Vec<ExecutedToolCall>,
    pub thinking: Option<String>,
}

/// Agent 实例：独占回合日志，一个会话一个实例，跨会话共享不受支持
pub struct Agent {
    backend: Arc<dyn Backend>,
    dispatcher: ToolDispatcher,
    permissions: Arc<PermissionEngine>,
    turns: TurnLog,
    system_prompt: String,
    params: SamplingParams,
    request_timeout: Duration,
}

impl Agent {
    pub fn new(backend: Arc<dyn Backend>, permissions: PermissionEngine) -> Self {
        let permissions = Arc::new(permissions);
        Self {
            backend,
            dispatcher: ToolDispatcher::new(
                ToolRegistry::new(),
                permissions.clone(),
                DEFAULT_TOOL_TIMEOUT_SECS,
            ),
            permissions,
            turns: TurnLog::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            params: SamplingParams::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(timeout_secs);
        self
    }

    pub fn with_tool_timeout(mut self, timeout_secs: u64) -> Self {
        self.dispatcher.set_timeout(timeout_secs);
        self
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn register_tool(&mut self, tool: impl Tool + 'static) {
        self.dispatcher.register(tool);
    }

    /// 注册默认工具（echo + 权限门控 shell）
    pub fn register_default_tools(&mut self, tool_timeout_secs: u64) {
        self.dispatcher.register(EchoTool);
        self.dispatcher.register(ShellTool::new(tool_timeout_secs));
    }

    pub fn turns(&self) -> &[Turn] {
        self.turns.turns()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.dispatcher.tool_names()
    }

    pub fn permissions(&self) -> &PermissionEngine {
        &self.permissions
    }

    /// 工具回引契约：工具通过所属 Agent 请求操作权限
    pub fn request_permission(&self, operation: &str, details: Map<String, Value>) -> bool {
        self.permissions.request(operation, details)
    }

    /// 跑一轮编排；user_info 非空时序列化为环境注解包进用户回合
    pub async fn chat(&mut self, message: &str, user_info: Option<&Value>) -> AgentResponse {
        self.turns
            .push(Turn::user(format_user_message(message, user_info)));

        let schemas = self.dispatcher.schemas();
        let first = match self.send_with_timeout(&schemas).await {
            Ok(response) => response,
            Err(e) => return self.error_response(e),
        };

        if first.tool_calls.is_empty() {
            self.turns.push(Turn::assistant(first.text.clone()));
            return AgentResponse {
                message: first.text,
                tool_calls: Vec::new(),
                thinking: first.thinking,
            };
        }

        // 工具回合：严格按后端返回顺序串行执行，后面的调用可能依赖前面的副作用
        self.turns.push(Turn::assistant_tool_calls(
            Some(first.text.clone()),
            first.tool_calls.clone(),
        ));

        let mut executed = Vec::with_capacity(first.tool_calls.len());
        let mut results = Vec::with_capacity(first.tool_calls.len());
        for call in &first.tool_calls {
            let result = self.dispatcher.dispatch(call).await;
            executed.push(ExecutedToolCall {
                name: call.name.clone(),
                parameters: call.arguments.clone(),
                result: result.output.clone(),
            });
            results.push(result);
        }
        self.turns.push(Turn::tool_results(results));

        // 二次调用不再提供工具，强制给出文本结论；仍无文本则用固定回退消息，不递归
        let second = match self.send_with_timeout(&[]).await {
            Ok(response) => response,
            Err(e) => {
                let error = self.error_response(e);
                return AgentResponse {
                    message: error.message,
                    tool_calls: executed,
                    thinking: first.thinking,
                };
            }
        };

        let message = if second.text.trim().is_empty() {
            FALLBACK_AFTER_TOOLS.to_string()
        } else {
            second.text
        };
        self.turns.push(Turn::assistant(message.clone()));

        AgentResponse {
            message,
            tool_calls: executed,
            thinking: second.thinking.or(first.thinking),
        }
    }

    async fn send_with_timeout(
        &self,
        tools: &[ToolSchema],
    ) -> Result<BackendResponse, BackendError> {
        match tokio::time::timeout(
            self.request_timeout,
            self.backend
                .send(self.turns.turns(), tools, &self.system_prompt, &self.params),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Transient(format!(
                "request timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }

    /// 后端错误按类别映射为固定文本响应
    fn error_response(&self, err: BackendError) -> AgentResponse {
        tracing::warn!(provider = %self.backend.provider(), error = %err, "backend call failed");
        let message = match &err {
            BackendError::Auth(detail) => format!(
                "Error: Authentication failed. Please check your API key. Details: {}",
                detail
            ),
            BackendError::RateLimit(detail) => format!(
                "Error: Rate limit exceeded. Please try again later. Details: {}",
                detail
            ),
            BackendError::BadRequest(detail) => {
                format!("Error: Bad request to the backend API. Details: {}", detail)
            }
            BackendError::Transient(detail) => {
                format!("Error: Transient backend failure. Details: {}", detail)
            }
            BackendError::Unknown(detail) => {
                format!("Error: An unexpected error occurred. Details: {}", detail)
            }
        };
        AgentResponse {
            message,
            tool_calls: Vec::new(),
            thinking: None,
        }
    }
}

/// 包装用户消息：带环境快照时序列化为 <user_info> JSON + <user_query>
fn format_user_message(message: &str, user_info: Option<&Value>) -> String {
    match user_info {
        Some(info) => {
            let serialized =
                serde_json::to_string_pretty(info).unwrap_or_else(|_| "{}".to_string());
            format!(
                "<user_info>\n{}\n</user_info>\n\n<user_query>\n{}\n</user_query>",
                serialized, message
            )
        }
        None => format!("<user_query>\n{}\n</user_query>", message),
    }
}
