//! Ollama 本地模型客户端
//!
//! POST {base}/api/chat（stream=false）；工具声明沿用 OpenAI 风格的 function 包装，
//! 但工具调用参数可能是原生对象也可能是编码字符串，两种都接受；Ollama 不返回
//! 调用 id，由适配器生成 uuid 以满足结果回填。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::traits::{
    classify_status, classify_transport, decode_arguments, Backend, BackendError,
    BackendResponse, SamplingParams,
};
use crate::memory::{Role, ToolCallRequest, Turn};
use crate::tools::ToolSchema;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Ollama 客户端
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: Option<&str>, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or(OLLAMA_BASE_URL).to_string(),
            model: model.to_string(),
        }
    }
}

fn turns_to_messages(turns: &[Turn], system: &str) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": system})];
    for turn in turns {
        match turn.role {
            Role::User => messages.push(json!({"role": "user", "content": turn.text()})),
            Role::Assistant => {
                let calls: Vec<Value> = turn
                    .tool_calls()
                    .iter()
                    .map(|call| {
                        json!({
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments,
                            }
                        })
                    })
                    .collect();
                let mut message = json!({"role": "assistant", "content": turn.text()});
                if !calls.is_empty() {
                    message["tool_calls"] = Value::Array(calls);
                }
                messages.push(message);
            }
            Role::ToolResult => {
                for result in turn.tool_results_blocks() {
                    messages.push(json!({"role": "tool", "content": result.output}));
                }
            }
        }
    }
    messages
}

fn tools_to_wire(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters.to_json_schema(),
                }
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// 对象或编码字符串，视模型而定
    #[serde(default)]
    arguments: Value,
}

fn parse_response(raw: Value) -> Result<BackendResponse, BackendError> {
    let parsed: ChatResponse = serde_json::from_value(raw.clone())
        .map_err(|e| BackendError::Unknown(format!("unexpected response shape: {}", e)))?;

    let tool_calls = parsed
        .message
        .tool_calls
        .into_iter()
        .map(|tc| ToolCallRequest {
            id: uuid::Uuid::new_v4().to_string(),
            name: tc.function.name,
            arguments: decode_arguments(&tc.function.arguments),
        })
        .collect();

    Ok(BackendResponse {
        text: parsed.message.content,
        tool_calls,
        thinking: parsed.message.thinking,
        raw,
    })
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn send(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        system: &str,
        params: &SamplingParams,
    ) -> Result<BackendResponse, BackendError> {
        let mut body = json!({
            "model": self.model,
            "stream": false,
            "messages": turns_to_messages(turns, system),
            "options": {"temperature": params.temperature},
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools_to_wire(tools));
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(classify_transport)?;
        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body_text));
        }

        let raw: Value = serde_json::from_str(&body_text)
            .map_err(|e| BackendError::Unknown(format!("invalid response JSON: {}", e)))?;
        parse_response(raw)
    }

    fn provider(&self) -> &str {
        "ollama"
    }
}
