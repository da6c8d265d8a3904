//! 工具权限策略引擎
//!
//! 评估顺序固定不可调：删除保护 > 命令黑名单 > yolo（白名单）> 默认确认。
//! 子串匹配刻意保守：黑名单 token 出现在命令任意位置即拒绝，宁可误伤不可放行。

use std::io::Write;
use std::sync::Arc;

use serde_json::{Map, Value};

/// run_terminal_command：Shell 命令类操作名
pub const OP_RUN_TERMINAL_COMMAND: &str = "run_terminal_command";
/// delete_file：破坏性删除类操作名
pub const OP_DELETE_FILE: &str = "delete_file";

/// 权限评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    NeedsConfirmation,
}

/// 一次操作的权限请求
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub operation: String,
    pub details: Map<String, Value>,
}

/// 权限配置：会话创建时构造一次，之后不可变
#[derive(Debug, Clone)]
pub struct PermissionOptions {
    pub yolo_mode: bool,
    /// yolo 模式启用时展示的提示语
    pub yolo_prompt: Option<String>,
    pub command_allowlist: Vec<String>,
    pub command_denylist: Vec<String>,
    pub delete_file_protection: bool,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            yolo_mode: false,
            yolo_prompt: None,
            command_allowlist: Vec::new(),
            command_denylist: Vec::new(),
            delete_file_protection: true,
        }
    }
}

/// 确认回调：宿主可注册自己的确认通道（TUI、IM 等）
pub type PermissionCallback = Arc<dyn Fn(&PermissionRequest) -> PermissionStatus + Send + Sync>;

/// 策略引擎：evaluate 为纯函数，request 负责把 NeedsConfirmation 落到回调或默认控制台确认
pub struct PermissionEngine {
    options: PermissionOptions,
    callback: Option<PermissionCallback>,
}

impl PermissionEngine {
    pub fn new(options: PermissionOptions) -> Self {
        if options.yolo_mode {
            let banner = options.yolo_prompt.clone().unwrap_or_else(|| {
                "YOLO MODE ENABLED: some operations will be performed without confirmation."
                    .to_string()
            });
            tracing::warn!(banner = %banner, "yolo mode");
        }
        Self {
            options,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: PermissionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn options(&self) -> &PermissionOptions {
        &self.options
    }

    /// 固定优先级评估：
    /// 1. 删除保护命中 -> NeedsConfirmation（压过包括 yolo 在内的一切）
    /// 2. 命令含黑名单 token -> Denied
    /// 3. yolo：命令需匹配白名单（配置了白名单时），其余操作直接放行
    /// 4. 默认 -> NeedsConfirmation
    pub fn evaluate(&self, request: &PermissionRequest) -> PermissionStatus {
        if request.operation == OP_DELETE_FILE && self.options.delete_file_protection {
            return PermissionStatus::NeedsConfirmation;
        }

        if request.operation == OP_RUN_TERMINAL_COMMAND {
            let command = command_of(&request.details);
            if self
                .options
                .command_denylist
                .iter()
                .any(|denied| command.contains(denied.as_str()))
            {
                return PermissionStatus::Denied;
            }
        }

        if self.options.yolo_mode {
            if request.operation == OP_RUN_TERMINAL_COMMAND {
                let command = command_of(&request.details);
                if !self.options.command_allowlist.is_empty()
                    && !self
                        .options
                        .command_allowlist
                        .iter()
                        .any(|allowed| command.contains(allowed.as_str()))
                {
                    return PermissionStatus::NeedsConfirmation;
                }
            }
            return PermissionStatus::Granted;
        }

        PermissionStatus::NeedsConfirmation
    }

    /// 请求执行某操作；Denied 记日志返回 false，NeedsConfirmation 经回调
    /// 或默认控制台确认解决
    pub fn request(&self, operation: &str, details: Map<String, Value>) -> bool {
        let request = PermissionRequest {
            operation: operation.to_string(),
            details,
        };
        match self.evaluate(&request) {
            PermissionStatus::Granted => true,
            PermissionStatus::Denied => {
                let details = Value::Object(request.details.clone());
                tracing::warn!(
                    operation = %request.operation,
                    details = %details,
                    "permission denied"
                );
                false
            }
            PermissionStatus::NeedsConfirmation => {
                let status = match &self.callback {
                    Some(cb) => cb(&request),
                    None => console_confirm(&request),
                };
                status == PermissionStatus::Granted
            }
        }
    }
}

fn command_of(details: &Map<String, Value>) -> &str {
    details
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// 默认确认通道：阻塞式控制台 y/n；读失败按拒绝处理
pub fn console_confirm(request: &PermissionRequest) -> PermissionStatus {
    let details =
        serde_json::to_string_pretty(&request.details).unwrap_or_else(|_| "{}".to_string());
    println!("\nPermission Request: {}", request.operation);
    println!("Details: {}", details);

    loop {
        print!("Allow this operation? (y/n): ");
        if std::io::stdout().flush().is_err() {
            return PermissionStatus::Denied;
        }
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return PermissionStatus::Denied;
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return PermissionStatus::Granted,
            "n" | "no" => return PermissionStatus::Denied,
            _ => println!("Please enter 'y' or 'n'"),
        }
    }
}
