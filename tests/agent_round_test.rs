//! 编排循环与交互式驱动集成测试（Mock 后端）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use wasp::core::{Agent, AgentError, FALLBACK_AFTER_TOOLS};
use wasp::driver::{run_interactive, DriverIo, DriverOptions, DriverOutcome};
use wasp::llm::{BackendError, MockBackend};
use wasp::memory::Role;
use wasp::permissions::{PermissionEngine, PermissionOptions};
use wasp::tools::Tool;

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn execute(
        &self,
        _args: &Map<String, Value>,
        _permissions: &PermissionEngine,
    ) -> Result<Value, String> {
        Err("boom".to_string())
    }
}

fn agent_with(backend: Arc<MockBackend>) -> Agent {
    let mut agent = Agent::new(backend, PermissionEngine::new(PermissionOptions::default()));
    agent.register_default_tools(5);
    agent
}

fn text_args(text: &str) -> Map<String, Value> {
    let mut args = Map::new();
    args.insert("text".to_string(), json!(text));
    args
}

#[tokio::test]
async fn test_no_tool_round_appends_exactly_two_turns() {
    let backend = Arc::new(MockBackend::new());
    backend.push_text("Hello, how can I help?");
    let mut agent = agent_with(backend.clone());

    let response = agent.chat("hi", None).await;

    assert_eq!(response.message, "Hello, how can I help?");
    assert!(response.tool_calls.is_empty());
    assert_eq!(agent.turns().len(), 2);
    assert_eq!(agent.turns()[0].role, Role::User);
    assert_eq!(agent.turns()[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_tool_round_appends_four_turns_and_reoffers_no_tools() {
    let backend = Arc::new(MockBackend::new());
    backend.push_tool_call("echo", text_args("ping"));
    backend.push_text("The echo came back: ping. Done.");
    let mut agent = agent_with(backend.clone());

    let response = agent.chat("please echo ping", None).await;

    assert_eq!(response.message, "The echo came back: ping. Done.");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "echo");
    assert_eq!(response.tool_calls[0].result, "ping");

    // user + assistant(tool_use) + 聚合 tool_results + 最终 assistant
    assert_eq!(agent.turns().len(), 4);
    assert_eq!(agent.turns()[0].role, Role::User);
    assert_eq!(agent.turns()[1].role, Role::Assistant);
    assert_eq!(agent.turns()[2].role, Role::ToolResult);
    assert_eq!(agent.turns()[3].role, Role::Assistant);

    // 二次调用必须不再提供工具，且携带已扩展的历史
    assert_eq!(backend.tool_counts(), vec![2, 0]);
    assert_eq!(backend.turn_counts(), vec![1, 3]);
}

#[tokio::test]
async fn test_tool_result_references_request_from_same_round() {
    let backend = Arc::new(MockBackend::new());
    backend.push_tool_call("echo", text_args("x"));
    backend.push_text("done");
    let mut agent = agent_with(backend);

    agent.chat("echo x", None).await;

    let calls = agent.turns()[1].tool_calls();
    let results = agent.turns()[2].tool_results_blocks();
    assert_eq!(calls.len(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].request_id, calls[0].id);
    assert!(!results[0].is_error);
}

#[tokio::test]
async fn test_failing_tool_is_isolated_and_round_completes() {
    let backend = Arc::new(MockBackend::new());
    backend.push_tool_call("explode", Map::new());
    backend.push_text("The tool failed, but here is what I know.");
    let mut agent = agent_with(backend);
    agent.register_tool(FailingTool);

    let response = agent.chat("try the tool", None).await;

    assert_eq!(response.message, "The tool failed, but here is what I know.");
    assert_eq!(response.tool_calls.len(), 1);
    assert!(response.tool_calls[0].result.contains("boom"));

    let results = agent.turns()[2].tool_results_blocks();
    assert!(results[0].is_error);
    assert!(results[0].output.contains("boom"));
    assert_eq!(agent.turns().len(), 4);
}

#[tokio::test]
async fn test_unknown_tool_round_still_returns_response() {
    let backend = Arc::new(MockBackend::new());
    backend.push_tool_call("no_such_tool", Map::new());
    backend.push_text("I could not find that tool.");
    let mut agent = agent_with(backend);

    let response = agent.chat("use the mystery tool", None).await;

    assert_eq!(response.tool_calls.len(), 1);
    assert!(response.tool_calls[0].result.contains("not found"));
    let results = agent.turns()[2].tool_results_blocks();
    assert!(results[0].is_error);
}

#[tokio::test]
async fn test_empty_second_reply_falls_back_to_fixed_message() {
    let backend = Arc::new(MockBackend::new());
    backend.push_tool_call("echo", text_args("y"));
    backend.push_text("   ");
    let mut agent = agent_with(backend);

    let response = agent.chat("echo y", None).await;

    assert_eq!(response.message, FALLBACK_AFTER_TOOLS);
    assert_eq!(agent.turns().len(), 4);
}

#[tokio::test]
async fn test_backend_errors_become_textual_responses() {
    let backend = Arc::new(MockBackend::new());
    backend.push_error(BackendError::Auth("bad key".to_string()));
    backend.push_error(BackendError::RateLimit("slow down".to_string()));
    let mut agent = agent_with(backend);

    let response = agent.chat("hello", None).await;
    assert!(response.message.starts_with("Error: Authentication failed"));
    assert!(response.tool_calls.is_empty());

    let response = agent.chat("hello again", None).await;
    assert!(response.message.starts_with("Error: Rate limit exceeded"));
}

/// 脚本化交互通道：prompt 返回预置行，菜单返回预置选择
#[derive(Default)]
struct ScriptIo {
    lines: Vec<String>,
    picks: Vec<usize>,
    notices: Vec<String>,
}

impl DriverIo for ScriptIo {
    fn prompt_line(&mut self, _prompt: &str) -> std::io::Result<String> {
        Ok(if self.lines.is_empty() {
            String::new()
        } else {
            self.lines.remove(0)
        })
    }

    fn pick(&mut self, _prompt: &str, _options: &[&str]) -> std::io::Result<usize> {
        Ok(if self.picks.is_empty() {
            1
        } else {
            self.picks.remove(0)
        })
    }

    fn notify(&mut self, text: &str) {
        self.notices.push(text.to_string());
    }
}

fn driver_options(workspace: &std::path::Path) -> DriverOptions {
    DriverOptions {
        workspace: workspace.to_path_buf(),
        ..DriverOptions::default()
    }
}

#[tokio::test]
async fn test_completion_heuristic_ends_driver_at_iteration_one() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_text("Task is complete. All requirements have been met.");
    let mut agent = agent_with(backend);
    let mut io = ScriptIo::default();

    let report = run_interactive(
        &mut agent,
        "write a readme",
        &driver_options(dir.path()),
        &mut io,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, DriverOutcome::Completed);
    assert_eq!(report.iterations, 1);
    assert!(report.final_response.contains("Task is complete"));
    assert!(io.notices.iter().any(|n| n.contains("任务完成")));
}

#[tokio::test]
async fn test_driver_exhausts_iterations_with_auto_continue() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    // 脚本耗尽后 Mock 固定回复 "(mock: script exhausted)"，不会触发任何启发式
    let mut agent = agent_with(backend);
    let mut io = ScriptIo::default();

    let opts = DriverOptions {
        max_iterations: 3,
        ..driver_options(dir.path())
    };
    let report = run_interactive(
        &mut agent,
        "an endless task",
        &opts,
        &mut io,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, DriverOutcome::IterationsExhausted);
    assert_eq!(report.iterations, 3);
}

#[tokio::test]
async fn test_input_request_solicits_user_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_text("Could you provide the target directory?");
    // 续行提示生成调用
    backend.push_text("The user wants the build in ./out; continue there.");
    // 下一轮直接完成
    backend.push_text("Task is complete. All requirements have been met.");
    let mut agent = agent_with(backend);
    let mut io = ScriptIo {
        lines: vec!["./out".to_string()],
        ..ScriptIo::default()
    };

    let report = run_interactive(
        &mut agent,
        "build the project",
        &driver_options(dir.path()),
        &mut io,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, DriverOutcome::Completed);
    assert_eq!(report.iterations, 2);
}

#[tokio::test]
async fn test_backend_error_recovery_abort() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_error(BackendError::Auth("bad key".to_string()));
    let mut agent = agent_with(backend);
    // 恢复菜单选 3 = 结束会话
    let mut io = ScriptIo {
        picks: vec![3],
        ..ScriptIo::default()
    };

    let report = run_interactive(
        &mut agent,
        "anything",
        &driver_options(dir.path()),
        &mut io,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, DriverOutcome::Aborted);
}

#[tokio::test]
async fn test_backend_error_recovery_fold_continues() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.push_error(BackendError::Transient("connection reset".to_string()));
    backend.push_text("Task is complete. All requirements have been met.");
    let mut agent = agent_with(backend);
    // 恢复菜单选 2 = 带着错误信息继续
    let mut io = ScriptIo {
        picks: vec![2],
        ..ScriptIo::default()
    };

    let report = run_interactive(
        &mut agent,
        "anything",
        &driver_options(dir.path()),
        &mut io,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, DriverOutcome::Completed);
    assert_eq!(report.iterations, 2);
}

#[tokio::test]
async fn test_cancellation_aborts_at_iteration_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());
    let mut agent = agent_with(backend);
    let mut io = ScriptIo::default();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = run_interactive(
        &mut agent,
        "anything",
        &driver_options(dir.path()),
        &mut io,
        cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AgentError::Cancelled));
}
