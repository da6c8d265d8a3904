//! 完成与求输入启发式
//!
//! 纯函数文本匹配，独立可测。短语集合来自对模型实际措辞的观察，已知脆弱；
//! 将来若改用专用完成信号（如 completion 工具调用），替换 interactive 里的
//! 两个调用点即可。

use std::sync::OnceLock;

use regex::Regex;

/// 完成指示短语（小写匹配）
const COMPLETION_INDICATORS: &[&str] = &[
    "task complete",
    "task is complete",
    "completed all the required tasks",
    "successfully implemented all",
    "all requirements have been met",
    "implementation is now complete",
    "successfully created all the necessary",
    "the project is now ready",
    "everything is now implemented",
    "all features are now implemented",
];

/// 命中后在这么多字符内出现 "next" 则视为计划陈述而非完成
const NEXT_WINDOW_CHARS: usize = 50;

/// 求输入的特征短语（小写匹配）
const INPUT_REQUEST_PHRASES: &[&str] = &[
    "could you provide",
    "can you provide",
    "please let me know",
    "what would you like",
    "how would you like",
    "do you have a preference",
];

fn question_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\?(\s|$)").unwrap())
}

/// 回复是否表示任务已完成
pub fn is_task_complete(response: &str) -> bool {
    let lower = response.to_lowercase();

    for indicator in COMPLETION_INDICATORS {
        if let Some(idx) = lower.find(indicator) {
            let window: String = lower[idx..].chars().take(NEXT_WINDOW_CHARS).collect();
            if !window.contains("next") {
                return true;
            }
        }
    }

    if lower.contains("summary of what we've accomplished") && !lower.contains("next steps") {
        return true;
    }

    if (lower.contains("in conclusion") || lower.contains("to summarize"))
        && (lower.contains("all requirements") || lower.contains("all functionality"))
    {
        return true;
    }

    false
}

/// 回复是否在直接向用户请求输入；命中时返回展示给用户的提示语
pub fn input_request(response: &str) -> Option<String> {
    if question_regex().is_match(response) {
        return Some("Please provide the requested information:".to_string());
    }

    let lower = response.to_lowercase();
    for phrase in INPUT_REQUEST_PHRASES {
        if lower.contains(phrase) {
            return Some("Please provide the requested information:".to_string());
        }
    }

    None
}
