//! 编排器：按配置装配执行底座、Job 注册表、会话存储与各条流水线
//!
//! 同步调用方（HTTP 处理器、CLI、测试）只与本对象交互；Agent 能力以 trait 对象注入。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::agent::AgentClient;
use crate::config::AppConfig;
use crate::core::error::{CoreError, Result};
use crate::core::run_loop::AgentRuntime;
use crate::jobs::{JobCounts, JobId, JobRegistry, JobView};
use crate::journey::JourneyPlanner;
use crate::session::{
    ChatOutcome, CompletionDetector, DiagnosticFlow, DiagnosticRequest, MasteryLevel,
    SessionStore, TutorChat, TutorReply,
};
use crate::srs::{Flashcard, RecallQuality};

pub struct Orchestrator {
    runtime: Arc<AgentRuntime>,
    sessions: Arc<SessionStore>,
    jobs: Arc<JobRegistry>,
    planner: Arc<JourneyPlanner>,
    diagnostic: DiagnosticFlow,
    tutor: TutorChat,
}

impl Orchestrator {
    /// 装配全部组件并启动常驻事件循环
    pub fn new(cfg: &AppConfig, agent: Arc<dyn AgentClient>) -> Result<Self> {
        let runtime = Arc::new(AgentRuntime::new(cfg.runtime.call_timeout()));
        runtime.ensure_running()?;

        let sessions = Arc::new(SessionStore::new());
        let jobs = Arc::new(JobRegistry::new(cfg.jobs.worker_pool_size)?);
        let planner = Arc::new(JourneyPlanner::new(
            Arc::clone(&runtime),
            Arc::clone(&agent),
            cfg.jobs.error_excerpt_chars,
        ));
        let detector = CompletionDetector::new(&cfg.diagnostic.sentinel, &cfg.diagnostic.tool_name);

        let diagnostic = DiagnosticFlow::new(
            Arc::clone(&runtime),
            Arc::clone(&agent),
            Arc::clone(&sessions),
            Arc::clone(&jobs),
            Arc::clone(&planner),
            detector,
        );
        let tutor = TutorChat::new(
            Arc::clone(&runtime),
            agent,
            Arc::clone(&sessions),
            cfg.tutor.fallback_reply.clone(),
        );

        tracing::info!(
            "Orchestrator ready (workers: {}, call timeout: {:?})",
            jobs.capacity(),
            runtime.timeout()
        );

        Ok(Self {
            runtime,
            sessions,
            jobs,
            planner,
            diagnostic,
            tutor,
        })
    }

    pub fn diagnostic_chat(&self, request: DiagnosticRequest) -> Result<ChatOutcome> {
        self.diagnostic.chat(request)
    }

    /// 从原始大纲文本生成学习路径，立即返回 Job ID
    pub fn submit_syllabus(&self, syllabus: &str) -> Result<JobId> {
        if syllabus.trim().is_empty() {
            return Err(CoreError::InvalidRequest("Syllabus text is required".to_string()));
        }
        let planner = Arc::clone(&self.planner);
        let text = syllabus.to_string();
        Ok(self.jobs.spawn(move || planner.plan_syllabus(&text)))
    }

    /// 直接按 (topic, level) 生成学习路径，不经过诊断面试
    pub fn submit_topic_plan(&self, topic: &str, level: MasteryLevel) -> Result<JobId> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoreError::InvalidRequest("Topic is required".to_string()));
        }
        let planner = Arc::clone(&self.planner);
        let topic = topic.to_string();
        Ok(self.jobs.spawn(move || planner.plan_topic(&topic, level)))
    }

    pub fn job_status(&self, job_id: &str) -> Result<JobView> {
        self.jobs.get_status(job_id)
    }

    pub fn wait_for_job(&self, job_id: &str, timeout: Duration) -> Result<JobView> {
        self.jobs.wait(job_id, timeout)
    }

    pub fn job_counts(&self) -> JobCounts {
        self.jobs.counts()
    }

    pub fn tutor_chat(&self, user_id: &str, message: &str) -> Result<TutorReply> {
        self.tutor.send(user_id, message)
    }

    pub fn reset_tutor(&self, user_id: &str) -> bool {
        self.tutor.reset(user_id)
    }

    /// 以当前时间记录一次复习
    pub fn review_flashcard(&self, card: &mut Flashcard, quality: u8) -> Result<()> {
        let quality = RecallQuality::new(quality)?;
        card.review(quality, Utc::now());
        tracing::debug!(
            "Card {} reviewed (q={}, next interval: {} days)",
            card.id,
            quality.value(),
            card.schedule.interval
        );
        Ok(())
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }

    pub fn shutdown(&self) {
        tracing::info!("Orchestrator shutting down");
        self.runtime.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentVariant, ScriptedAgent, ScriptedReply};
    use crate::jobs::JobStatus;

    fn orchestrator(agent: Arc<ScriptedAgent>) -> Orchestrator {
        Orchestrator::new(&AppConfig::default(), agent).unwrap()
    }

    #[test]
    fn test_new_starts_run_loop() {
        let orch = orchestrator(Arc::new(ScriptedAgent::new()));
        assert!(orch.runtime().is_running());
        orch.shutdown();
        assert!(!orch.runtime().is_running());
    }

    #[test]
    fn test_submit_syllabus() {
        let agent = Arc::new(ScriptedAgent::new());
        agent.push_text(AgentVariant::JourneyPlanner, r#"{"journey_id": "j-9", "nodes": []}"#);
        let orch = orchestrator(agent);

        let id = orch.submit_syllabus("Week 1: Ownership").unwrap();
        let view = orch.wait_for_job(&id, Duration::from_secs(5)).unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.result.unwrap()["journey_id"], "j-9");
    }

    #[test]
    fn test_hanging_planner_fails_job() {
        let agent = Arc::new(ScriptedAgent::new());
        agent.push(
            AgentVariant::JourneyPlanner,
            ScriptedReply::Slow(Duration::from_secs(3), r#"{"nodes": []}"#.to_string()),
        );
        let mut cfg = AppConfig::default();
        cfg.runtime.call_timeout_secs = 1;
        let orch = Orchestrator::new(&cfg, agent).unwrap();

        let id = orch.submit_topic_plan("Rust", MasteryLevel::Beginner).unwrap();
        let view = orch.wait_for_job(&id, Duration::from_secs(10)).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(
            view.error,
            Some(CoreError::Timeout(Duration::from_secs(1)).to_string())
        );
        assert!(view.result.is_none());
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let orch = orchestrator(Arc::new(ScriptedAgent::new()));
        assert!(matches!(orch.submit_syllabus("  "), Err(CoreError::InvalidRequest(_))));
        assert!(matches!(
            orch.submit_topic_plan("", MasteryLevel::Beginner),
            Err(CoreError::InvalidRequest(_))
        ));
        assert!(orch.jobs().is_empty());
    }

    #[test]
    fn test_unknown_job() {
        let orch = orchestrator(Arc::new(ScriptedAgent::new()));
        assert_eq!(
            orch.job_status("missing").unwrap_err(),
            CoreError::JobNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_review_flashcard() {
        let orch = orchestrator(Arc::new(ScriptedAgent::new()));
        let mut card = Flashcard::new("front", "back", Utc::now());
        orch.review_flashcard(&mut card, 5).unwrap();
        assert_eq!(card.schedule.interval, 1);
        assert_eq!(card.schedule.review_count, 1);

        assert_eq!(
            orch.review_flashcard(&mut card, 7).unwrap_err(),
            CoreError::InvalidQuality(7)
        );
        assert_eq!(card.schedule.review_count, 1);
    }

    #[test]
    fn test_long_easy_streak_does_not_overflow() {
        let orch = orchestrator(Arc::new(ScriptedAgent::new()));
        let mut card = Flashcard::new("front", "back", Utc::now());
        for _ in 0..100 {
            orch.review_flashcard(&mut card, 5).unwrap();
        }
        assert_eq!(card.schedule.review_count, 100);
        assert_eq!(card.schedule.interval, crate::srs::MAX_INTERVAL_DAYS);
    }
}
