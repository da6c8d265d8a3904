//! 对话回合日志
//!
//! Turn 为带角色标签的不可变回合（文本与/或结构化块），TurnLog 只增不改；
//! ToolCallRequest / ToolCallResult 为单轮内的临时值类型，跨轮不保留引用。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 回合角色；ToolResult 对应各后端的工具结果消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

/// 模型请求执行某个已注册工具
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// 单轮内唯一；后端未提供时由适配器生成 uuid
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// 工具执行结果；request_id 必须对应同轮内发出的请求
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub request_id: String,
    pub output: String,
    pub is_error: bool,
}

/// 回合内容块
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolCallRequest),
    ToolResult(ToolCallResult),
}

/// 单条回合：创建后不再修改
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    /// 模型发起工具调用的 assistant 回合，可带说明文本
    pub fn assistant_tool_calls(text: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if let Some(t) = text {
            if !t.is_empty() {
                content.push(ContentBlock::Text(t));
            }
        }
        content.extend(calls.into_iter().map(ContentBlock::ToolUse));
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// 单轮的全部工具结果聚合为一条回合
    pub fn tool_results(results: Vec<ToolCallResult>) -> Self {
        Self {
            role: Role::ToolResult,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// 拼接全部文本块
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallRequest> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn tool_results_blocks(&self) -> Vec<&ToolCallResult> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

/// 追加式回合日志：会话生命周期内累积，仅由编排循环写入
#[derive(Debug, Default)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_text_joins_text_blocks_only() {
        let turn = Turn::assistant_tool_calls(
            Some("calling".to_string()),
            vec![ToolCallRequest {
                id: "t1".into(),
                name: "echo".into(),
                arguments: Map::new(),
            }],
        );
        assert_eq!(turn.text(), "calling");
        assert_eq!(turn.tool_calls().len(), 1);
    }

    #[test]
    fn test_assistant_tool_calls_skips_empty_text() {
        let turn = Turn::assistant_tool_calls(Some(String::new()), vec![]);
        assert!(turn.content.is_empty());
    }

    #[test]
    fn test_tool_results_turn_role() {
        let turn = Turn::tool_results(vec![ToolCallResult {
            request_id: "t1".into(),
            output: "ok".into(),
            is_error: false,
        }]);
        assert_eq!(turn.role, Role::ToolResult);
        assert_eq!(turn.tool_results_blocks().len(), 1);
    }

    #[test]
    fn test_turn_log_appends_in_order() {
        let mut log = TurnLog::new();
        log.push(Turn::user("hi"));
        log.push(Turn::assistant("hello"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.turns()[0].role, Role::User);
        assert_eq!(log.turns()[1].role, Role::Assistant);
    }
}
