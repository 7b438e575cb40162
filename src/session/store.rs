//! 会话存储
//!
//! 以不透明会话 ID 为键，保存 Agent 对话句柄、固定话题与驱动对话的 Agent 变体。
//! 会话本身不可变（对话历史保存在 Agent 能力内部），只会被创建和删除。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::agent::{AgentVariant, ConversationHandle};

/// 会话 ID
pub type SessionId = String;

/// 进行中的多轮对话
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSession {
    pub id: SessionId,
    pub conversation: ConversationHandle,
    /// 创建时确定，之后不变
    pub topic: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn variant(&self) -> AgentVariant {
        self.conversation.variant
    }
}

/// 会话存储：表级 Mutex，创建 / 删除对并发读取原子可见
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, ConversationSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为已打开的对话登记新会话
    pub fn open(&self, conversation: ConversationHandle, topic: impl Into<String>) -> ConversationSession {
        let session = ConversationSession {
            id: uuid::Uuid::new_v4().to_string(),
            conversation,
            topic: topic.into(),
            created_at: Utc::now(),
        };
        self.lock().insert(session.id.clone(), session.clone());
        tracing::debug!("Session {} opened ({:?})", session.id, session.variant());
        session
    }

    pub fn get(&self, session_id: &str) -> Option<ConversationSession> {
        self.lock().get(session_id).cloned()
    }

    /// 仅当会话存在且由指定变体驱动时返回
    pub fn get_variant(&self, session_id: &str, variant: AgentVariant) -> Option<ConversationSession> {
        self.get(session_id).filter(|s| s.variant() == variant)
    }

    pub fn remove(&self, session_id: &str) -> Option<ConversationSession> {
        let removed = self.lock().remove(session_id);
        if removed.is_some() {
            tracing::debug!("Session {} removed", session_id);
        }
        removed
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 各变体的活跃会话数
    pub fn count(&self, variant: AgentVariant) -> usize {
        self.lock().values().filter(|s| s.variant() == variant).count()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, ConversationSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
