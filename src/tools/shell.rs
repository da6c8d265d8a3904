//! Shell 工具：执行前经策略引擎请求 run_terminal_command 权限
//!
//! 调度器不按操作名预过滤，权限请求由工具自己发起；执行通过 sh -c / cmd /C，
//! 超时后连带杀掉子进程（kill_on_drop）。

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;

use crate::permissions::{PermissionEngine, OP_RUN_TERMINAL_COMMAND};
use crate::tools::{ParameterSpec, Tool};

/// 权限门控的终端命令工具
pub struct ShellTool {
    timeout_secs: u64,
}

impl ShellTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }

    fn description(&self) -> &str {
        "Run a terminal command in the workspace. Requires permission; denied or unconfirmed commands are not executed."
    }

    fn parameters_schema(&self) -> ParameterSpec {
        let mut properties = Map::new();
        properties.insert(
            "command".to_string(),
            json!({
                "type": "string",
                "description": "The shell command to execute"
            }),
        );
        ParameterSpec {
            properties,
            required: vec!["command".to_string()],
        }
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        permissions: &PermissionEngine,
    ) -> Result<Value, String> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if command.is_empty() {
            return Err("Empty command".to_string());
        }

        let mut details = Map::new();
        details.insert("command".to_string(), json!(command));
        if !permissions.request(OP_RUN_TERMINAL_COMMAND, details) {
            return Err(format!("Permission not granted for command: {}", command));
        }

        tracing::info!(command = %command, "shell tool execute");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| format!("Command timed out after {}s", self.timeout_secs))?
        .map_err(|e| format!("Execution failed: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(format!("Exit {:?}\nstderr: {}", output.status, stderr.trim()));
        }
        Ok(json!(if stderr.is_empty() {
            stdout
        } else {
            format!("{}\nstderr: {}", stdout.trim(), stderr.trim())
        }))
    }
}
