//! 后端工厂：按模型名路由到提供商
//!
//! claude* -> Anthropic；gpt* / o1* / deepseek* -> OpenAI 兼容端点；其余走本地 Ollama。
//! 配置里显式给了 provider 时以配置为准。API Key 依次取配置与各家环境变量，
//! 形状明显不对时只告警不中断（测试环境常用占位 Key）。

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::anthropic::AnthropicBackend;
use crate::llm::ollama::OllamaBackend;
use crate::llm::openai::OpenAiBackend;
use crate::llm::traits::Backend;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 模型别名规范化
fn normalize_model(model: &str) -> String {
    match model {
        "gpt-4o-2024-05-13" | "gpt-4o-2024-08-06" => "gpt-4o".to_string(),
        "gpt-4-turbo" => "gpt-4".to_string(),
        "claude-3.5-sonnet" => "claude-3-5-sonnet-latest".to_string(),
        other => other.to_string(),
    }
}

/// 按模型名推断提供商
pub fn provider_for_model(model: &str) -> &'static str {
    if model.starts_with("claude") {
        "anthropic"
    } else if model.starts_with("gpt") || model.starts_with("o1") || model.starts_with("deepseek") {
        "openai"
    } else {
        "ollama"
    }
}

/// Key 形状检查：sk- 前缀、足够长、无空格；dummy 串留给测试环境
fn looks_like_api_key(key: &str) -> bool {
    if key.contains("dummy") || key.contains("placeholder") {
        return true;
    }
    key.starts_with("sk-") && key.len() >= 20 && !key.contains(' ')
}

fn resolve_api_key(cfg: &LlmSection, env_vars: &[&str]) -> String {
    let key = cfg.api_key.clone().or_else(|| {
        env_vars
            .iter()
            .find_map(|name| std::env::var(name).ok())
    });
    let key = key.unwrap_or_else(|| "sk-placeholder".to_string());
    if !looks_like_api_key(&key) {
        tracing::warn!("API key does not look like a valid key; requests may fail with Auth errors");
    }
    key
}

/// 从配置创建后端客户端
pub fn create_backend(cfg: &LlmSection) -> Arc<dyn Backend> {
    let model = normalize_model(&cfg.model);
    let provider = if cfg.provider.is_empty() {
        provider_for_model(&model)
    } else {
        cfg.provider.as_str()
    };

    match provider {
        "anthropic" => {
            let api_key = resolve_api_key(cfg, &["ANTHROPIC_API_KEY"]);
            Arc::new(AnthropicBackend::new(
                cfg.base_url.as_deref(),
                &model,
                &api_key,
            ))
        }
        "openai" => {
            let api_key = resolve_api_key(cfg, &["OPENAI_API_KEY", "DEEPSEEK_API_KEY"]);
            let base_url = cfg.base_url.clone().or_else(|| {
                model
                    .starts_with("deepseek")
                    .then(|| DEEPSEEK_BASE_URL.to_string())
            });
            Arc::new(OpenAiBackend::new(
                base_url.as_deref(),
                &model,
                Some(api_key.as_str()),
            ))
        }
        _ => Arc::new(OllamaBackend::new(cfg.base_url.as_deref(), &model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_routing_by_model_name() {
        assert_eq!(provider_for_model("claude-3-5-sonnet-latest"), "anthropic");
        assert_eq!(provider_for_model("gpt-4o"), "openai");
        assert_eq!(provider_for_model("deepseek-chat"), "openai");
        assert_eq!(provider_for_model("llama3.1"), "ollama");
        assert_eq!(provider_for_model("qwen2.5-coder"), "ollama");
    }

    #[test]
    fn test_model_alias_normalization() {
        assert_eq!(normalize_model("gpt-4o-2024-08-06"), "gpt-4o");
        assert_eq!(normalize_model("claude-3.5-sonnet"), "claude-3-5-sonnet-latest");
        assert_eq!(normalize_model("gpt-4-turbo"), "gpt-4");
        assert_eq!(normalize_model("llama3.1"), "llama3.1");
    }

    #[test]
    fn test_api_key_shape_check() {
        assert!(looks_like_api_key("sk-ant-REDACTED"));
        assert!(looks_like_api_key("sk-ant-dummy"));
        assert!(!looks_like_api_key("short"));
        assert!(!looks_like_api_key("sk-has space in it yes"));
    }

    #[test]
    fn test_create_backend_respects_explicit_provider() {
        let cfg = LlmSection {
            provider: "ollama".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            ..LlmSection::default()
        };
        let backend = create_backend(&cfg);
        assert_eq!(backend.provider(), "ollama");
    }

    #[test]
    fn test_create_backend_routes_by_model_when_provider_empty() {
        let cfg = LlmSection {
            model: "gpt-4o".to_string(),
            api_key: Some("sk-test-0123456789abcdef".to_string()),
            ..LlmSection::default()
        };
        let backend = create_backend(&cfg);
        assert_eq!(backend.provider(), "openai");
    }
}
