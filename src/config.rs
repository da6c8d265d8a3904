//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WASP__*` 覆盖（双下划线表示嵌套，如 `WASP__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::permissions::PermissionOptions;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub permissions: PermissionsSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub driver: DriverSection,
}

/// [app] 段：应用名与工作目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 工作区根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：anthropic / openai / ollama；留空则按模型名路由
    #[serde(default)]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次后端请求超时（秒），区别于单次工具调用超时
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    180
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [permissions] 段：会话级权限策略，启动时构造一次，之后不可变
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionsSection {
    #[serde(default)]
    pub yolo_mode: bool,
    pub yolo_prompt: Option<String>,
    #[serde(default)]
    pub command_allowlist: Vec<String>,
    #[serde(default)]
    pub command_denylist: Vec<String>,
    #[serde(default = "default_delete_file_protection")]
    pub delete_file_protection: bool,
}

fn default_delete_file_protection() -> bool {
    true
}

impl Default for PermissionsSection {
    fn default() -> Self {
        Self {
            yolo_mode: false,
            yolo_prompt: None,
            command_allowlist: Vec::new(),
            command_denylist: Vec::new(),
            delete_file_protection: default_delete_file_protection(),
        }
    }
}

impl PermissionsSection {
    pub fn to_options(&self) -> PermissionOptions {
        PermissionOptions {
            yolo_mode: self.yolo_mode,
            yolo_prompt: self.yolo_prompt.clone(),
            command_allowlist: self.command_allowlist.clone(),
            command_denylist: self.command_denylist.clone(),
            delete_file_protection: self.delete_file_protection,
        }
    }
}

/// [tools] 段：工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    300
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// [driver] 段：交互式驱动的迭代与预算上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_auto_continue")]
    pub auto_continue: bool,
    /// 单轮工具调用软预算，超限后经确认可加宽
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_iteration: usize,
}

fn default_max_iterations() -> usize {
    10
}

fn default_auto_continue() -> bool {
    true
}

fn default_max_tool_calls() -> usize {
    5
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            auto_continue: default_auto_continue(),
            max_tool_calls_per_iteration: default_max_tool_calls(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            permissions: PermissionsSection::default(),
            tools: ToolsSection::default(),
            driver: DriverSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WASP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WASP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WASP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_sections() {
        let cfg = AppConfig::default();
        assert!(!cfg.permissions.yolo_mode);
        assert!(cfg.permissions.delete_file_protection);
        assert_eq!(cfg.driver.max_iterations, 10);
        assert_eq!(cfg.driver.max_tool_calls_per_iteration, 5);
        assert_eq!(cfg.llm.timeouts.request, 180);
    }

    #[test]
    fn test_permissions_section_to_options() {
        let section = PermissionsSection {
            yolo_mode: true,
            yolo_prompt: None,
            command_allowlist: vec!["ls".into()],
            command_denylist: vec!["sudo".into()],
            delete_file_protection: true,
        };
        let options = section.to_options();
        assert!(options.yolo_mode);
        assert_eq!(options.command_allowlist, vec!["ls".to_string()]);
        assert_eq!(options.command_denylist, vec!["sudo".to_string()]);
    }
}
