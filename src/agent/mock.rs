//! 脚本化 Mock Agent（用于测试与演示，无需模型服务）
//!
//! 每个 AgentVariant 维护一个回复队列，按调用顺序出队；队列为空时使用该变体的兜底回复。
//! 记录每段对话收到的消息，便于断言话题锚定等行为。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;

use crate::agent::{AgentClient, AgentError, AgentEvent, AgentVariant, ConversationHandle, EventStream};

/// 一条预设回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// 纯文本回复
    Text(String),
    /// 事件序列（可混合文本与工具输出）
    Events(Vec<AgentEvent>),
    /// 调用失败
    Fail(String),
    /// 延迟后返回文本
    Slow(Duration, String),
}

#[derive(Default)]
pub struct ScriptedAgent {
    scripts: Mutex<HashMap<AgentVariant, VecDeque<ScriptedReply>>>,
    fallbacks: Mutex<HashMap<AgentVariant, String>>,
    /// conversation id -> 收到的消息
    conversations: Mutex<HashMap<String, Vec<String>>>,
    invocations: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条回复到变体队列
    pub fn push(&self, variant: AgentVariant, reply: ScriptedReply) -> &Self {
        lock(&self.scripts).entry(variant).or_default().push_back(reply);
        self
    }

    pub fn push_text(&self, variant: AgentVariant, text: impl Into<String>) -> &Self {
        self.push(variant, ScriptedReply::Text(text.into()))
    }

    /// 设置队列为空时的兜底回复
    pub fn with_fallback(self, variant: AgentVariant, text: impl Into<String>) -> Self {
        lock(&self.fallbacks).insert(variant, text.into());
        self
    }

    /// 某段对话收到的全部消息
    pub fn history(&self, conversation: &ConversationHandle) -> Vec<String> {
        lock(&self.conversations)
            .get(&conversation.id)
            .cloned()
            .unwrap_or_default()
    }

    /// 丢弃对话（模拟服务端会话失效，之后的调用返回 UnknownConversation）
    pub fn forget(&self, conversation: &ConversationHandle) {
        lock(&self.conversations).remove(&conversation.id);
    }

    pub fn open_conversations(&self) -> usize {
        lock(&self.conversations).len()
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn next_reply(&self, variant: AgentVariant) -> ScriptedReply {
        if let Some(reply) = lock(&self.scripts).get_mut(&variant).and_then(|q| q.pop_front()) {
            return reply;
        }
        match lock(&self.fallbacks).get(&variant) {
            Some(text) => ScriptedReply::Text(text.clone()),
            None => ScriptedReply::Fail(format!("no scripted reply for {:?}", variant)),
        }
    }
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn new_conversation(&self, variant: AgentVariant) -> Result<ConversationHandle, AgentError> {
        let handle = ConversationHandle {
            variant,
            id: format!("conv_{}", uuid::Uuid::new_v4()),
        };
        lock(&self.conversations).insert(handle.id.clone(), Vec::new());
        Ok(handle)
    }

    async fn run(&self, conversation: &ConversationHandle, text: &str) -> Result<EventStream, AgentError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        {
            let mut conversations = lock(&self.conversations);
            let history = conversations
                .get_mut(&conversation.id)
                .ok_or_else(|| AgentError::UnknownConversation(conversation.id.clone()))?;
            history.push(text.to_string());
        }

        let events = match self.next_reply(conversation.variant) {
            ScriptedReply::Text(text) => vec![AgentEvent::Text(text)],
            ScriptedReply::Events(events) => events,
            ScriptedReply::Fail(reason) => return Err(AgentError::InvocationFailed(reason)),
            ScriptedReply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                vec![AgentEvent::Text(text)]
            }
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
