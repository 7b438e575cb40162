//! 诊断交接状态机
//!
//! NEW → CHATTING → COMPLETE（终态）或 EXPIRED（终态，错误路径）。
//!
//! - 无会话 ID 或 ID 未知：打开诊断对话，发送嵌入话题的开场提示，进入 CHATTING
//! - 已知会话 ID：用户回答总是包上固定话题后再发送，避免对话漂移到无关主题
//! - 输出中出现完成信号：同步删除会话，提交 (topic, level) 规划 Job，返回 Job ID 与掌握程度（不返回该轮原文）
//! - 对已知会话的调用失败：删除会话并告知调用方会话已过期，不自动重试
//! - skip 请求：跳过面试，直接以 Beginner 提交规划 Job

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::signal::{CompletionDetector, MasteryLevel};
use super::store::{ConversationSession, SessionId, SessionStore};
use crate::agent::{AgentClient, AgentVariant};
use crate::core::error::{CoreError, Result};
use crate::core::run_loop::AgentRuntime;
use crate::jobs::{JobId, JobRegistry};
use crate::journey::JourneyPlanner;

pub const EXPIRED_MESSAGE: &str = "Session expired. Please start again.";
pub const SKIP_MESSAGE: &str = "Skipping assessment. Generating journey for beginners...";

pub fn opening_prompt(topic: &str) -> String {
    format!(
        "I want to learn about {}. Please assess my current knowledge level.",
        topic
    )
}

/// 每轮回答都重新锚定话题
pub fn anchored_answer(topic: &str, answer: &str) -> String {
    format!("[Topic: {}] User's answer: {}", topic, answer)
}

/// 状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticState {
    New,
    Chatting,
    Complete,
    Expired,
}

/// 一次诊断请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosticRequest {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub skip: bool,
}

impl DiagnosticRequest {
    pub fn start(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn answer(session_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            answer: answer.into(),
            ..Self::default()
        }
    }

    pub fn skip(session_id: Option<String>, topic: impl Into<String>) -> Self {
        Self {
            session_id,
            topic: topic.into(),
            skip: true,
            ..Self::default()
        }
    }
}

/// 返回给调用方的三种形态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChatOutcome {
    Chatting {
        session_id: SessionId,
        message: String,
    },
    Processing {
        session_id: SessionId,
        job_id: JobId,
        level: MasteryLevel,
        message: String,
    },
    Expired {
        message: String,
    },
}

impl ChatOutcome {
    /// 本次请求结束后状态机所处的状态
    pub fn state(&self) -> DiagnosticState {
        match self {
            Self::Chatting { .. } => DiagnosticState::Chatting,
            Self::Processing { .. } => DiagnosticState::Complete,
            Self::Expired { .. } => DiagnosticState::Expired,
        }
    }
}

pub struct DiagnosticFlow {
    runtime: Arc<AgentRuntime>,
    agent: Arc<dyn AgentClient>,
    sessions: Arc<SessionStore>,
    jobs: Arc<JobRegistry>,
    planner: Arc<JourneyPlanner>,
    detector: CompletionDetector,
}

impl DiagnosticFlow {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        agent: Arc<dyn AgentClient>,
        sessions: Arc<SessionStore>,
        jobs: Arc<JobRegistry>,
        planner: Arc<JourneyPlanner>,
        detector: CompletionDetector,
    ) -> Self {
        Self {
            runtime,
            agent,
            sessions,
            jobs,
            planner,
            detector,
        }
    }

    /// 处理一轮诊断请求
    pub fn chat(&self, request: DiagnosticRequest) -> Result<ChatOutcome> {
        if request.skip {
            return self.skip(request);
        }

        let existing = request
            .session_id
            .as_deref()
            .and_then(|id| self.sessions.get_variant(id, AgentVariant::Diagnostic));

        match existing {
            Some(session) => self.continue_session(session, &request.answer),
            None => self.start(&request.topic),
        }
    }

    /// NEW → CHATTING（开场回复即含完成信号时直接 COMPLETE）
    fn start(&self, topic: &str) -> Result<ChatOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoreError::InvalidRequest(
                "Topic is required to start a diagnostic".to_string(),
            ));
        }

        let conversation = self
            .runtime
            .open_conversation(&self.agent, AgentVariant::Diagnostic)?;
        let session = self.sessions.open(conversation, topic);
        tracing::info!("New diagnostic session {} for topic: {}", session.id, topic);

        match self
            .runtime
            .invoke(&self.agent, &session.conversation, &opening_prompt(topic))
        {
            Ok(reply) => Ok(self.inspect(session, &reply)),
            Err(e) => {
                tracing::error!("Opening turn failed for session {}: {}", session.id, e);
                self.sessions.remove(&session.id);
                Err(e)
            }
        }
    }

    /// CHATTING → CHATTING / COMPLETE / EXPIRED
    fn continue_session(&self, session: ConversationSession, answer: &str) -> Result<ChatOutcome> {
        tracing::info!("Continuing diagnostic session {}", session.id);
        let prompt = anchored_answer(&session.topic, answer);

        match self.runtime.invoke(&self.agent, &session.conversation, &prompt) {
            Ok(reply) => Ok(self.inspect(session, &reply)),
            Err(e) => {
                tracing::warn!("Diagnostic session {} expired: {}", session.id, e);
                self.sessions.remove(&session.id);
                Ok(ChatOutcome::Expired {
                    message: EXPIRED_MESSAGE.to_string(),
                })
            }
        }
    }

    fn inspect(&self, session: ConversationSession, reply: &str) -> ChatOutcome {
        match self.detector.detect(reply) {
            Some(level) => {
                tracing::info!("Diagnostic complete for session {}: {}", session.id, level);
                self.sessions.remove(&session.id);
                let job_id = self.submit_plan(session.topic, level);
                ChatOutcome::Processing {
                    session_id: session.id,
                    job_id,
                    level,
                    message: format!(
                        "Diagnostic complete! Level: {}. Generating personalized journey...",
                        level
                    ),
                }
            }
            None => ChatOutcome::Chatting {
                message: self.detector.strip_signal(reply).to_string(),
                session_id: session.id,
            },
        }
    }

    /// NEW / CHATTING → COMPLETE，固定 Beginner
    fn skip(&self, request: DiagnosticRequest) -> Result<ChatOutcome> {
        let mut topic = request.topic.trim().to_string();
        if let Some(session) = request
            .session_id
            .as_deref()
            .and_then(|id| self.sessions.get_variant(id, AgentVariant::Diagnostic))
        {
            topic = session.topic.clone();
            self.sessions.remove(&session.id);
        }

        if topic.is_empty() {
            return Err(CoreError::InvalidRequest(
                "Topic is required to skip assessment".to_string(),
            ));
        }

        tracing::info!("Skipping diagnostic for topic: {}", topic);
        let job_id = self.submit_plan(topic, MasteryLevel::Beginner);
        Ok(ChatOutcome::Processing {
            session_id: request
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            job_id,
            level: MasteryLevel::Beginner,
            message: SKIP_MESSAGE.to_string(),
        })
    }

    fn submit_plan(&self, topic: String, level: MasteryLevel) -> JobId {
        let planner = Arc::clone(&self.planner);
        self.jobs.spawn(move || planner.plan_topic(&topic, level))
    }
}
