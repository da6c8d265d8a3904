//! Echo 工具（测试与演示用）

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::permissions::PermissionEngine;
use crate::tools::{ParameterSpec, Tool};

/// 原样返回输入文本
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the provided text. Useful for testing the tool pipeline."
    }

    fn parameters_schema(&self) -> ParameterSpec {
        let mut properties = Map::new();
        properties.insert(
            "text".to_string(),
            json!({
                "type": "string",
                "description": "The text to echo back"
            }),
        );
        ParameterSpec {
            properties,
            required: vec!["text".to_string()],
        }
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        _permissions: &PermissionEngine,
    ) -> Result<Value, String> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("");
        Ok(json!(text))
    }
}
