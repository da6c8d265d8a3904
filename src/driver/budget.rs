//! 单轮工具调用预算
//!
//! 软限制：超限后经用户确认按固定增量加宽，绝不在回合中途硬性失败；
//! 用户给出新输入时重置计数，加宽后的上限保留。

/// 每次确认后加宽的额度
pub const WIDEN_INCREMENT: usize = 5;

#[derive(Debug, Clone)]
pub struct ToolCallBudget {
    limit: usize,
    used: usize,
}

impl ToolCallBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn record(&mut self, calls: usize) {
        self.used += calls;
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn widen(&mut self) {
        self.limit += WIDEN_INCREMENT;
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
