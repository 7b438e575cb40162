//! 导师对话：每个用户一段常驻的 Tutor 会话
//!
//! 首条消息时惰性创建；调用失败会丢弃该用户的会话，下一条消息重新开始。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::store::{SessionId, SessionStore};
use crate::agent::{AgentClient, AgentVariant};
use crate::core::error::{CoreError, Result};
use crate::core::run_loop::AgentRuntime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TutorReply {
    pub response: String,
    pub session_id: SessionId,
}

pub struct TutorChat {
    runtime: Arc<AgentRuntime>,
    agent: Arc<dyn AgentClient>,
    sessions: Arc<SessionStore>,
    /// user id -> session id
    by_user: Mutex<HashMap<String, SessionId>>,
    fallback_reply: String,
}

impl TutorChat {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        agent: Arc<dyn AgentClient>,
        sessions: Arc<SessionStore>,
        fallback_reply: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            agent,
            sessions,
            by_user: Mutex::new(HashMap::new()),
            fallback_reply: fallback_reply.into(),
        }
    }

    pub fn send(&self, user_id: &str, message: &str) -> Result<TutorReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CoreError::InvalidRequest("Message is required".to_string()));
        }

        let session_id = self.session_for(user_id)?;
        let Some(session) = self.sessions.get_variant(&session_id, AgentVariant::Tutor) else {
            self.lock().remove(user_id);
            return Err(CoreError::SessionNotFound(session_id));
        };

        match self.runtime.invoke(&self.agent, &session.conversation, message) {
            Ok(reply) => {
                let reply = reply.trim();
                let response = if reply.is_empty() {
                    self.fallback_reply.clone()
                } else {
                    reply.to_string()
                };
                Ok(TutorReply {
                    response,
                    session_id: session.id,
                })
            }
            Err(e) => {
                tracing::error!("Tutor call failed for user {}: {}", user_id, e);
                self.reset(user_id);
                Err(e)
            }
        }
    }

    /// 丢弃用户的导师会话
    pub fn reset(&self, user_id: &str) -> bool {
        match self.lock().remove(user_id) {
            Some(session_id) => self.sessions.remove(&session_id).is_some(),
            None => false,
        }
    }

    fn session_for(&self, user_id: &str) -> Result<SessionId> {
        if let Some(id) = self.lock().get(user_id) {
            return Ok(id.clone());
        }

        let conversation = self.runtime.open_conversation(&self.agent, AgentVariant::Tutor)?;
        let session = self.sessions.open(conversation, "");

        let mut by_user = self.lock();
        let chosen = by_user
            .entry(user_id.to_string())
            .or_insert_with(|| session.id.clone())
            .clone();
        drop(by_user);

        if chosen != session.id {
            // 同一用户的并发首条消息，保留先登记的会话
            self.sessions.remove(&session.id);
        } else {
            tracing::info!("Created tutor session {} for user {}", chosen, user_id);
        }
        Ok(chosen)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionId>> {
        self.by_user.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ScriptedAgent, ScriptedReply};

    fn tutor(agent: Arc<ScriptedAgent>) -> (TutorChat, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let chat = TutorChat::new(
            Arc::new(AgentRuntime::default()),
            agent,
            sessions.clone(),
            "Please rephrase.",
        );
        (chat, sessions)
    }

    #[test]
    fn test_session_is_reused_per_user() {
        let agent = Arc::new(ScriptedAgent::new().with_fallback(AgentVariant::Tutor, " answer "));
        let (chat, sessions) = tutor(agent.clone());

        let first = chat.send("u1", "What is a trait?").unwrap();
        let second = chat.send("u1", "And a lifetime?").unwrap();
        assert_eq!(first.response, "answer");
        assert_eq!(first.session_id, second.session_id);

        let other = chat.send("u2", "Hello").unwrap();
        assert_ne!(other.session_id, first.session_id);
        assert_eq!(sessions.count(AgentVariant::Tutor), 2);

        let session = sessions.get(&first.session_id).unwrap();
        assert_eq!(agent.history(&session.conversation).len(), 2);
    }

    #[test]
    fn test_empty_reply_uses_fallback() {
        let agent = Arc::new(ScriptedAgent::new());
        agent.push_text(AgentVariant::Tutor, "   ");
        let (chat, _) = tutor(agent);
        assert_eq!(chat.send("u1", "hi").unwrap().response, "Please rephrase.");
    }

    #[test]
    fn test_failure_drops_session() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_text(AgentVariant::Tutor, "first")
            .push(AgentVariant::Tutor, ScriptedReply::Fail("overloaded".to_string()))
            .push_text(AgentVariant::Tutor, "fresh");
        let (chat, sessions) = tutor(agent);

        let first = chat.send("u1", "q1").unwrap();
        assert!(chat.send("u1", "q2").is_err());
        assert!(!sessions.contains(&first.session_id));

        let fresh = chat.send("u1", "q3").unwrap();
        assert_ne!(fresh.session_id, first.session_id);
        assert_eq!(fresh.response, "fresh");
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let agent = Arc::new(ScriptedAgent::new());
        let (chat, sessions) = tutor(agent.clone());
        assert!(matches!(chat.send("u1", "  "), Err(CoreError::InvalidRequest(_))));
        assert!(sessions.is_empty());
        assert_eq!(agent.invocations(), 0);
    }

    #[test]
    fn test_reset() {
        let agent = Arc::new(ScriptedAgent::new().with_fallback(AgentVariant::Tutor, "ok"));
        let (chat, sessions) = tutor(agent);
        chat.send("u1", "hi").unwrap();
        assert!(chat.reset("u1"));
        assert!(!chat.reset("u1"));
        assert!(sessions.is_empty());
    }
}
