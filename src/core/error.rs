//! Agent 错误类型
//!
//! 传输层错误在 llm::BackendError 归类，并在编排循环内折叠为文本响应；
//! 这里只剩会越过驱动循环的少数失败：协作式取消与交互通道 IO。
//! 其余失败路径一律以返回值形式描述，不向宿主进程抛出。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// 用户通过取消令牌终止
    #[error("Cancelled")]
    Cancelled,

    /// 交互通道（控制台等）读写失败，恢复菜单也无法展示
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
}
