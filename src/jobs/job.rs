//! Job 模型：ID、状态、结果/错误、时间戳
//!
//! 状态只允许 pending → completed 或 pending → failed，且仅一次；completed_at 当且仅当处于终态时存在。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job ID
pub type JobId = String;

/// 工作体的完成结果：Ok 为结构化结果，Err 为错误描述
pub type JobOutcome = std::result::Result<Value, String>;

/// Job 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone)]
enum JobState {
    Pending,
    Completed(Value),
    Failed(String),
}

/// 注册表中的 Job 记录
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    state: JobState,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: JobState::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        match self.state {
            JobState::Pending => JobStatus::Pending,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// 写入终态；已是终态时不做任何修改并返回 false
    pub(crate) fn finish(&mut self, outcome: JobOutcome) -> bool {
        if self.is_finished() {
            return false;
        }
        self.state = match outcome {
            Ok(result) => JobState::Completed(result),
            Err(error) => JobState::Failed(error),
        };
        self.completed_at = Some(Utc::now());
        true
    }

    /// 只读快照
    pub fn view(&self) -> JobView {
        let (result, error) = match &self.state {
            JobState::Pending => (None, None),
            JobState::Completed(v) => (Some(v.clone()), None),
            JobState::Failed(e) => (None, Some(e.clone())),
        };
        JobView {
            job_id: self.id.clone(),
            status: self.status(),
            result,
            error,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// 轮询返回的 Job 快照（result 仅在 completed 时出现，error 仅在 failed 时出现）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
