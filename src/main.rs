//! Wasp - 编码智能体演示入口
//!
//! 初始化日志与配置，按配置创建后端与 Agent，把命令行余下参数当作任务
//! 交给交互式驱动。

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use wasp::config::{load_config, AppConfig};
use wasp::core::Agent;
use wasp::driver::{run_interactive, ConsoleIo, DriverOptions};
use wasp::llm::{create_backend, SamplingParams};
use wasp::permissions::PermissionEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    wasp::observability::init();

    let task: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if task.is_empty() {
        eprintln!("Usage: wasp <task description>");
        return Ok(());
    }

    let cfg = load_config(None).unwrap_or_else(|_| AppConfig::default());

    let workspace = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| "workspace".into());
    std::fs::create_dir_all(&workspace).context("Failed to create workspace dir")?;

    let backend = create_backend(&cfg.llm);
    let engine = PermissionEngine::new(cfg.permissions.to_options());
    let mut agent = Agent::new(backend, engine)
        .with_params(SamplingParams {
            temperature: cfg.llm.temperature,
            max_tokens: cfg.llm.max_tokens,
        })
        .with_request_timeout(cfg.llm.timeouts.request)
        .with_tool_timeout(cfg.tools.tool_timeout_secs);
    agent.register_default_tools(cfg.tools.tool_timeout_secs);

    let opts = DriverOptions {
        max_iterations: cfg.driver.max_iterations,
        auto_continue: cfg.driver.auto_continue,
        max_tool_calls_per_iteration: cfg.driver.max_tool_calls_per_iteration,
        workspace,
    };

    let report = run_interactive(
        &mut agent,
        &task,
        &opts,
        &mut ConsoleIo,
        CancellationToken::new(),
    )
    .await
    .context("Interactive driver failed")?;

    println!(
        "\n[{:?}] {} 轮后结束。\n{}",
        report.outcome, report.iterations, report.final_response
    );

    Ok(())
}
