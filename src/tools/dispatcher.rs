//! 工具调度器
//!
//! dispatch(request)：未知工具、执行失败与超时一律转为 is_error 的 ToolCallResult，
//! 绝不向调用方传播工具自身的失败；每次调用带超时并输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::memory::{ToolCallRequest, ToolCallResult};
use crate::permissions::PermissionEngine;
use crate::tools::{Tool, ToolRegistry, ToolSchema};

/// 调度器：持有注册表、策略引擎回引与单次调用超时
pub struct ToolDispatcher {
    registry: ToolRegistry,
    permissions: Arc<PermissionEngine>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, permissions: Arc<PermissionEngine>, timeout_secs: u64) -> Self {
        Self {
            registry,
            permissions,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.registry.register(tool);
    }

    pub fn set_timeout(&mut self, timeout_secs: u64) {
        self.timeout = Duration::from_secs(timeout_secs);
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行一条工具调用请求；任何失败路径都折叠为 is_error 的结果
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();

        let Some(tool) = self.registry.get(&request.name) else {
            self.audit(&request.name, false, "not_found", start);
            return ToolCallResult {
                request_id: request.id.clone(),
                output: format!("Tool '{}' not found. Error: Tool not available.", request.name),
                is_error: true,
            };
        };

        let result = timeout(
            self.timeout,
            tool.execute(&request.arguments, &self.permissions),
        )
        .await;

        let (outcome, tool_result) = match result {
            Ok(Ok(value)) => {
                let output = serialize_output(value);
                (
                    "ok",
                    ToolCallResult {
                        request_id: request.id.clone(),
                        output,
                        is_error: false,
                    },
                )
            }
            Ok(Err(e)) => (
                "error",
                ToolCallResult {
                    request_id: request.id.clone(),
                    output: format!("Error executing tool {}: {}", request.name, e),
                    is_error: true,
                },
            ),
            Err(_) => (
                "timeout",
                ToolCallResult {
                    request_id: request.id.clone(),
                    output: format!(
                        "Error executing tool {}: timed out after {}s",
                        request.name,
                        self.timeout.as_secs()
                    ),
                    is_error: true,
                },
            ),
        };

        self.audit(&request.name, !tool_result.is_error, outcome, start);
        tool_result
    }

    fn audit(&self, tool: &str, ok: bool, outcome: &str, start: Instant) {
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "tool");
    }
}

/// 非字符串结果统一序列化为规范文本编码
fn serialize_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => serde_json::to_string(&other).unwrap_or_else(|_| other.to_string()),
    }
}
