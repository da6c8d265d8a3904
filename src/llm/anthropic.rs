//! Anthropic Messages API 客户端
//!
//! system 为顶层参数；工具声明用嵌套 input_schema；工具调用以 tool_use 内容块返回，
//! input 为原生结构；工具结果以 user 回合的 tool_result 块发回。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::traits::{
    classify_status, classify_transport, decode_arguments, Backend, BackendError,
    BackendResponse, SamplingParams,
};
use crate::memory::{ContentBlock, Role, ToolCallRequest, Turn};
use crate::tools::ToolSchema;

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic 客户端：持有 reqwest Client、base_url、model 与 API Key
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicBackend {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or(ANTHROPIC_BASE_URL).to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// 回合映射为 Messages API 的 messages 数组
fn turns_to_messages(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => json!({
                "role": "user",
                "content": [{"type": "text", "text": turn.text()}],
            }),
            Role::Assistant => {
                let mut blocks = Vec::new();
                for block in &turn.content {
                    match block {
                        ContentBlock::Text(t) => {
                            blocks.push(json!({"type": "text", "text": t}));
                        }
                        ContentBlock::ToolUse(call) => {
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": call.id,
                                "name": call.name,
                                "input": call.arguments,
                            }));
                        }
                        ContentBlock::ToolResult(_) => {}
                    }
                }
                json!({"role": "assistant", "content": blocks})
            }
            // 工具结果在 Anthropic 线格式里是 user 回合的 tool_result 块
            Role::ToolResult => {
                let blocks: Vec<Value> = turn
                    .tool_results_blocks()
                    .iter()
                    .map(|r| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": r.request_id,
                            "content": r.output,
                            "is_error": r.is_error,
                        })
                    })
                    .collect();
                json!({"role": "user", "content": blocks})
            }
        })
        .collect()
}

fn tools_to_wire(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters.to_json_schema(),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

fn parse_response(raw: Value) -> Result<BackendResponse, BackendError> {
    let parsed: MessagesResponse = serde_json::from_value(raw.clone())
        .map_err(|e| BackendError::Unknown(format!("unexpected response shape: {}", e)))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut thinking = None;
    for block in parsed.content {
        match block {
            ResponseBlock::Text { text: t } => text.push_str(&t),
            ResponseBlock::ToolUse { id, name, input } => {
                let id = if id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    id
                };
                tool_calls.push(ToolCallRequest {
                    id,
                    name,
                    arguments: decode_arguments(&input),
                });
            }
            ResponseBlock::Thinking { thinking: t } => thinking = Some(t),
            ResponseBlock::Unknown => {}
        }
    }

    Ok(BackendResponse {
        text,
        tool_calls,
        thinking,
        raw,
    })
}

#[async_trait]
impl Backend for AnthropicBackend {
    async fn send(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        system: &str,
        params: &SamplingParams,
    ) -> Result<BackendResponse, BackendError> {
        let mut body = json!({
            "model": self.model,
            "system": system,
            "messages": turns_to_messages(turns),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools_to_wire(tools));
        }

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolCallResult;
    use crate::tools::ParameterSpec;
    use serde_json::Map;

    #[test]
    fn test_tools_wire_shape_is_nested() {
        let mut properties = Map::new();
        properties.insert("path".to_string(), json!({"type": "string"}));
        let tools = vec![ToolSchema {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            parameters: ParameterSpec {
                properties,
                required: vec!["path".to_string()],
            },
        }];
        let wire = tools_to_wire(&tools);
        assert_eq!(wire[0]["name"], json!("read_file"));
        assert_eq!(wire[0]["input_schema"]["type"], json!("object"));
        assert_eq!(wire[0]["input_schema"]["required"], json!(["path"]));
    }

    #[test]
    fn test_tool_result_turn_maps_to_user_message() {
        let turns = vec![Turn::tool_results(vec![ToolCallResult {
            request_id: "toolu_1".to_string(),
            output: "done".to_string(),
            is_error: false,
        }])];
        let messages = turns_to_messages(&turns);
        assert_eq!(messages[0]["role"], json!("user"));
        assert_eq!(messages[0]["content"][0]["type"], json!("tool_result"));
        assert_eq!(messages[0]["content"][0]["tool_use_id"], json!("toolu_1"));
    }

    #[test]
    fn test_parse_response_extracts_text_and_tool_calls() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "I'll list the directory."},
                {"type": "tool_use", "id": "toolu_1", "name": "run_terminal_command",
                 "input": {"command": "ls"}},
            ]
        });
        let response = parse_response(raw).unwrap();
        assert_eq!(response.text, "I'll list the directory.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "run_terminal_command");
        assert_eq!(
            response.tool_calls[0].arguments.get("command"),
            Some(&json!("ls"))
        );
    }

    #[test]
    fn test_parse_response_tolerates_unknown_blocks() {
        let raw = json!({
            "content": [
                {"type": "server_tool_use", "whatever": 1},
                {"type": "text", "text": "ok"},
            ]
        });
        let response = parse_response(raw).unwrap();
        assert_eq!(response.text, "ok");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_response_malformed_input_falls_back_empty_args() {
        let raw = json!({
            "content": [
                {"type": "tool_use", "id": "toolu_2", "name": "echo", "input": "oops"},
            ]
        });
        let response = parse_response(raw).unwrap();
        assert!(response.tool_calls[0].arguments.is_empty());
    }
}
