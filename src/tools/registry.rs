//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；同名重复注册以后者为准（支持运行时换实现）。
//! schemas() 产出提供给后端适配器的规范化 ToolSchema 列表。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::permissions::PermissionEngine;

/// 参数规格：properties 映射 + 必填参数名列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSpec {
    /// 转为 JSON Schema 对象（type=object）
    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// 工具 schema：名称、描述（供模型理解）、参数规格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSpec,
}

/// 工具 trait
///
/// execute 的 args 为已解码的参数映射；permissions 为策略引擎回引，
/// 变更状态的工具必须在动作前自行调用 permissions.request（调度器不按操作名预过滤，
/// 因为同一调用点在不同工具里语义不同）。返回值非字符串时由调度器统一序列化。
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 默认无参数
    fn parameters_schema(&self) -> ParameterSpec {
        ParameterSpec::default()
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        permissions: &PermissionEngine,
    ) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名覆盖，最后一次注册生效
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 规范化 schema 列表，供适配器映射为各提供商的工具声明
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}
