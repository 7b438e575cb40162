//! 编排内核错误类型
//!
//! 每种错误都对应一个可记录的终态：失败的 Job、过期的会话或明确的 NotFound，不会让工作池或事件循环崩溃。

use std::time::Duration;

use thiserror::Error;

use crate::agent::AgentError;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// run_blocking 等待超时；后台任务可能仍在运行
    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run loop is closed")]
    RunLoopClosed,

    /// 在事件循环线程内调用 run_blocking 会自我死锁
    #[error("run_blocking called from the run loop thread")]
    ReentrantCall,

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Agent 输出无法解析为预期结构，附带截断的原文
    #[error("Failed to parse JSON. Raw: {excerpt}")]
    MalformedOutput { excerpt: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Recall quality must be within 0..=5, got {0}")]
    InvalidQuality(u8),

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for CoreError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_output_message_carries_excerpt() {
        let err = CoreError::MalformedOutput {
            excerpt: "not json".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to parse JSON. Raw: not json");
    }

    #[test]
    fn test_agent_error_is_transparent() {
        let err: CoreError = AgentError::InvocationFailed("boom".to_string()).into();
        assert_eq!(err.to_string(), "Agent invocation failed: boom");
    }
}
