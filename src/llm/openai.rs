//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），覆盖 OpenAI、
//! DeepSeek、自建代理等。工具声明为扁平 function 包装，工具调用参数以编码字符串返回，
//! 解码失败退回空参数集；工具结果以 tool 角色消息按 tool_call_id 发回。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::llm::traits::{
    decode_arguments, Backend, BackendError, BackendResponse, SamplingParams,
};
use crate::memory::{Role, ToolCallRequest, Turn};
use crate::tools::ToolSchema;

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    fn to_chat_messages(
        &self,
        turns: &[Turn],
        system: &str,
    ) -> Vec<ChatCompletionRequestMessage> {
        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .unwrap(),
        )];

        for turn in turns {
            match turn.role {
                Role::User => messages.push(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.text())
                        .build()
                        .unwrap(),
                )),
                Role::Assistant => {
                    let calls = turn.tool_calls();
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    let text = turn.text();
                    if !text.is_empty() {
                        builder.content(text);
                    }
                    if !calls.is_empty() {
                        let tool_calls: Vec<ChatCompletionMessageToolCall> = calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: Value::Object(call.arguments.clone()).to_string(),
                                },
                            })
                            .collect();
                        builder.tool_calls(tool_calls);
                    }
                    messages.push(ChatCompletionRequestMessage::Assistant(
                        builder.build().unwrap(),
                    ));
                }
                // 聚合的工具结果回合展开为多条 tool 消息
                Role::ToolResult => {
                    for result in turn.tool_results_blocks() {
                        messages.push(ChatCompletionRequestMessage::Tool(
                            ChatCompletionRequestToolMessageArgs::default()
                                .content(result.output.clone())
                                .tool_call_id(result.request_id.clone())
                                .build()
                                .unwrap(),
                        ));
                    }
                }
            }
        }

        messages
    }
}

fn to_chat_tools(tools: &[ToolSchema]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|t| {
            let function = FunctionObjectArgs::default()
                .name(t.name.clone())
                .description(t.description.clone())
                .parameters(t.parameters.to_json_schema())
                .build()
                .unwrap();
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()
                .unwrap()
        })
        .collect()
}

/// async_openai 错误归类：ApiError 按类型/消息判别，其余视为传输层瞬时错误
fn classify_openai(err: OpenAIError) -> BackendError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let detail = api.message.clone();
            let lowered = detail.to_lowercase();
            if kind.contains("auth") || lowered.contains("api key") || lowered.contains("unauthorized")
            {
                BackendError::Auth(detail)
            } else if kind.contains("rate_limit") || kind.contains("insufficient_quota") {
                BackendError::RateLimit(detail)
            } else if kind.contains("invalid_request") {
                BackendError::BadRequest(detail)
            } else {
                BackendError::Unknown(detail)
            }
        }
        other => BackendError::Transient(other.to_string()),
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn send(
        &self,
        turns: &[Turn],
        tools: &[ToolSchema],
        system: &str,
        params: &SamplingParams,
    ) -> Result<BackendResponse, BackendError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(self.to_chat_messages(turns, system))
            .temperature(params.temperature)
            .max_tokens(params.max_tokens);
        if !tools.is_empty() {
            builder.tools(to_chat_tools(tools));
        }
        let request = builder
            .build()
            .map_err(|e| BackendError::BadRequest(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai)?;

        let raw = serde_json::to_value(&response).unwrap_or(Value::Null);
        let choice = response.choices.into_iter().next();

        let text = choice
            .as_ref()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls)
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let id = if tc.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    tc.id
                };
                ToolCallRequest {
                    id,
                    name: tc.function.name,
                    arguments: decode_arguments(&Value::String(tc.function.arguments)),
                }
            })
            .collect();

        Ok(BackendResponse {
            text,
            tool_calls,
            thinking: None,
            raw,
        })
    }

    fn provider(&self) -> &str {
        "openai"
    }
}
