//! 交互式驱动层：多轮自治循环、启发式、环境快照与工具预算

pub mod budget;
pub mod env;
pub mod heuristics;
pub mod interactive;

pub use budget::{ToolCallBudget, WIDEN_INCREMENT};
pub use env::{CursorPosition, EnvSnapshot};
pub use heuristics::{input_request, is_task_complete};
pub use interactive::{
    run_interactive, ConsoleIo, DriverIo, DriverOptions, DriverOutcome, DriverReport,
};
