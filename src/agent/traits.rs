//! Agent 能力抽象
//!
//! 外部模型服务被视为不透明能力：new_conversation 打开一段多轮对话，run 在对话中发送一条文本并返回事件流
//! （文本片段 / 工具输出）。invoke 把事件流收集为一段完整文本。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Agent 变体：诊断面试官、导师、学习路径规划器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVariant {
    Diagnostic,
    Tutor,
    JourneyPlanner,
}

/// 对话句柄：由 Agent 能力分配，历史记录保存在能力内部
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHandle {
    pub variant: AgentVariant,
    pub id: String,
}

/// 一次调用产生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// 模型输出的文本片段
    Text(String),
    /// 工具调用的返回值（如 submit_diagnostic 返回的完成信号）
    ToolResult(String),
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Failed to open {0:?} conversation: {1}")]
    ConversationFailed(AgentVariant, String),

    #[error("Agent invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),
}

/// Agent 能力 trait：只允许通过 core::run_loop 调度的任务调用
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// 为指定变体打开新对话
    async fn new_conversation(&self, variant: AgentVariant) -> Result<ConversationHandle, AgentError>;

    /// 在对话中发送一条消息，返回事件流
    async fn run(&self, conversation: &ConversationHandle, text: &str) -> Result<EventStream, AgentError>;

    /// 发送消息并收集全部输出文本（含工具输出）
    async fn invoke(&self, conversation: &ConversationHandle, text: &str) -> Result<String, AgentError> {
        let events = self.run(conversation, text).await?;
        collect_response(events).await
    }
}

/// 收集事件流：文本片段直接拼接，工具输出前补一个空格
pub async fn collect_response(mut events: EventStream) -> Result<String, AgentError> {
    let mut full_text = String::new();
    while let Some(event) = events.next().await {
        match event? {
            AgentEvent::Text(text) => full_text.push_str(&text),
            AgentEvent::ToolResult(result) => {
                if !result.is_empty() {
                    tracing::debug!("Tool output captured: {}", result);
                    full_text.push(' ');
                    full_text.push_str(&result);
                }
            }
        }
    }
    Ok(full_text)
}
