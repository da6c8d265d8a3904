//! 后端适配层：规范化契约与各提供商实现（Anthropic / OpenAI 兼容 / Ollama / Mock）

pub mod anthropic;
pub mod factory;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod traits;

pub use anthropic::{AnthropicBackend, ANTHROPIC_BASE_URL};
pub use factory::{create_backend, provider_for_model, DEEPSEEK_BASE_URL};
pub use mock::MockBackend;
pub use ollama::{OllamaBackend, OLLAMA_BASE_URL};
pub use openai::OpenAiBackend;
pub use traits::{Backend, BackendError, BackendResponse, SamplingParams};
