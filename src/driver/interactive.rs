//! 交互式驱动
//!
//! 1..=max_iterations 的多轮自治循环：每轮刷新有界环境快照、跑一轮编排、
//! 按完成/求输入启发式决定转移，软预算超限经确认加宽。后端失败折叠出的
//! 错误响应走恢复菜单（重试 / 带错误继续 / 终止），驱动自身不终止宿主进程；
//! 取消为协作式，在迭代边界检查。

use std::io::Write as _;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::core::{Agent, AgentError};
use crate::driver::budget::ToolCallBudget;
use crate::driver::env::EnvSnapshot;
use crate::driver::heuristics::{input_request, is_task_complete};

/// 续行提示生成失败时的固定回退
const CONTINUATION_FALLBACK: &str =
    "Continue with the next steps based on the previous results.";

/// 驱动配置
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_iterations: usize,
    pub auto_continue: bool,
    /// 单轮工具调用软预算
    pub max_tool_calls_per_iteration: usize,
    pub workspace: PathBuf,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            auto_continue: true,
            max_tool_calls_per_iteration: 5,
            workspace: PathBuf::from("workspace"),
        }
    }
}

/// 终态：完成、迭代耗尽或用户终止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    Completed,
    IterationsExhausted,
    Aborted,
}

/// 驱动运行报告
#[derive(Debug, Clone)]
pub struct DriverReport {
    pub outcome: DriverOutcome,
    pub iterations: usize,
    pub final_response: String,
}

/// 用户交互通道；默认实现为阻塞式控制台，测试可注入脚本化实现
pub trait DriverIo {
    fn prompt_line(&mut self, prompt: &str) -> std::io::Result<String>;

    /// 展示提示与编号选项，返回 1 起的所选序号
    fn pick(&mut self, prompt: &str, options: &[&str]) -> std::io::Result<usize>;

    fn notify(&mut self, text: &str);
}

/// 阻塞式控制台交互
#[derive(Debug, Default)]
pub struct ConsoleIo;

impl DriverIo for ConsoleIo {
    fn prompt_line(&mut self, prompt: &str) -> std::io::Result<String> {
        print!("{} ", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn pick(&mut self, prompt: &str, options: &[&str]) -> std::io::Result<usize> {
        loop {
            println!("\n{}", prompt);
            for (i, option) in options.iter().enumerate() {
                println!("{}. {}", i + 1, option);
            }
            let line = self.prompt_line(&format!("选择 (1-{}):", options.len()))?;
            if let Ok(n) = line.parse::<usize>() {
                if (1..=options.len()).contains(&n) {
                    return Ok(n);
                }
            }
            println!("无效选择，请重新输入。");
        }
    }

    fn notify(&mut self, text: &str) {
        println!("{}", text);
    }
}

enum Recovery {
    Retry,
    Fold(String),
    Abort,
}

/// 恢复菜单：重试本轮 / 把错误折进下一轮提示 / 终止
fn recover(
    io: &mut dyn DriverIo,
    env: &mut EnvSnapshot,
    error: &str,
) -> Result<Recovery, AgentError> {
    env.record_error(error);
    let choice = io.pick(
        &format!("本轮出现错误：{}", error),
        &["重试本轮", "带着错误信息继续", "结束会话"],
    )?;
    Ok(match choice {
        1 => Recovery::Retry,
        2 => Recovery::Fold(format!(
            "There was an error in the previous step: {}. Please adjust your approach and continue.",
            error
        )),
        _ => Recovery::Abort,
    })
}

/// 首轮任务前缀（规划引导）
fn planning_preamble(task: &str) -> String {
    format!(
        "I'll help you complete this task step by step. I'll break it down and use tools like \
reading/creating/editing files and running commands as needed.\n\nTASK: {}\n\nFirst, I'll \
create a plan for how to approach this task, then implement it step by step.\n",
        task
    )
}

/// 续行提示：通过同一 Agent 的二次调用总结上一轮进展生成；失败或为空时退回固定提示
async fn continuation_prompt(
    agent: &mut Agent,
    iteration: usize,
    last_response: &str,
    user_input: Option<&str>,
) -> String {
    let mut analysis = format!(
        "Analyze the following assistant response from iteration {} and help create a \
continuation prompt.\n\nRESPONSE: {}\n\nSummarize in 1-2 sentences what was accomplished, \
what issues occurred, and what the next step should be.",
        iteration, last_response
    );
    if let Some(input) = user_input {
        analysis.push_str(&format!(
            "\n\nThe user added: {}\nIncorporate this guidance into the continuation.",
            input
        ));
    }

    let response = agent.chat(&analysis, None).await;
    let message = response.message.trim();
    if message.is_empty() || message.starts_with("Error:") {
        CONTINUATION_FALLBACK.to_string()
    } else {
        message.to_string()
    }
}

fn report(outcome: DriverOutcome, iterations: usize, final_response: String) -> DriverReport {
    DriverReport {
        outcome,
        iterations,
        final_response,
    }
}

/// 多轮自治循环入口
pub async fn run_interactive(
    agent: &mut Agent,
    initial_task: &str,
    opts: &DriverOptions,
    io: &mut dyn DriverIo,
    cancel: CancellationToken,
) -> Result<DriverReport, AgentError> {
    let mut env = EnvSnapshot::new(&opts.workspace);
    let mut budget = ToolCallBudget::new(opts.max_tool_calls_per_iteration);
    let mut query = planning_preamble(initial_task);
    let mut last_response = String::new();
    let mut iteration = 1usize;

    while iteration <= opts.max_iterations {
        if cancel.is_cancelled() {
            io.notify("已取消。");
            return Err(AgentError::Cancelled);
        }

        io.notify(&format!("迭代 {}/{}", iteration, opts.max_iterations));

        env.refresh();
        let user_info = env.to_value();
        let response = agent.chat(&query, Some(&user_info)).await;
        last_response = response.message.clone();

        // 工具调用记账与工作区状态跟踪
        for call in &response.tool_calls {
            env.record_tool_call(&call.name, &call.parameters);
            if call.name == "run_terminal_command" {
                if let Some(command) = call.parameters.get("command").and_then(|v| v.as_str()) {
                    env.record_command(command);
                }
            }
            if call.name == "create_file" || call.name == "edit_file" {
                let path = call
                    .parameters
                    .get("file_path")
                    .or_else(|| call.parameters.get("target_file"))
                    .and_then(|v| v.as_str());
                if let Some(path) = path {
                    env.note_file_touched(path);
                }
            }
        }
        budget.record(response.tool_calls.len());

        if budget.exhausted() {
            // 软预算：只能经确认加宽，绝不中断已执行的回合
            let choice = io.pick(
                &format!(
                    "本轮已执行 {} 次工具调用（上限 {}），是否放宽继续？",
                    budget.used(),
                    budget.limit()
                ),
                &["放宽并继续", "保持上限"],
            )?;
            if choice == 1 {
                budget.widen();
                io.notify(&format!("新上限 {}。", budget.limit()));
            }
        }

        // 后端失败在编排层折叠为错误文本，这里走恢复菜单而不是喂给启发式
        if response.tool_calls.is_empty() && response.message.starts_with("Error:") {
            match recover(io, &mut env, &response.message)? {
                Recovery::Retry => continue,
                Recovery::Fold(next) => {
                    query = next;
                    iteration += 1;
                    continue;
                }
                Recovery::Abort => {
                    return Ok(report(DriverOutcome::Aborted, iteration, last_response))
                }
            }
        }

        if is_task_complete(&response.message) {
            io.notify("任务完成。");
            return Ok(report(DriverOutcome::Completed, iteration, last_response));
        }

        if let Some(prompt) = input_request(&response.message) {
            io.notify("智能体在等待补充信息。");
            let user_input = io.prompt_line(&prompt)?;
            query = continuation_prompt(agent, iteration, &response.message, Some(&user_input)).await;
            budget.reset();
            iteration += 1;
            continue;
        }

        if opts.auto_continue {
            query = continuation_prompt(agent, iteration, &response.message, None).await;
            io.notify("自动继续下一步…");
            iteration += 1;
            continue;
        }

        let choice = io.pick(
            "下一步如何继续？",
            &["继续下一步", "向智能体补充信息", "调整计划", "结束会话"],
        )?;
        match choice {
            1 => {
                query = continuation_prompt(agent, iteration, &response.message, None).await;
            }
            2 => {
                let user_input = io.prompt_line("你的补充:")?;
                query =
                    continuation_prompt(agent, iteration, &response.message, Some(&user_input))
                        .await;
                budget.reset();
            }
            3 => {
                let plan = io.prompt_line("新的计划或指示:")?;
                query = format!(
                    "The user has updated the plan: {}\nAdjust your approach accordingly and continue.",
                    plan
                );
                budget.reset();
            }
            _ => return Ok(report(DriverOutcome::Aborted, iteration, last_response)),
        }
        iteration += 1;
    }

    io.notify(&format!("达到最大迭代数 ({})，停止。", opts.max_iterations));
    Ok(report(
        DriverOutcome::IterationsExhausted,
        opts.max_iterations,
        last_response,
    ))
}
