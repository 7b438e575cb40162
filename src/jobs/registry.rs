//! Job 注册表
//!
//! 创建即返回 ID，工作体交给有界工作池执行；工作体的任何失败（错误或 panic）都在边界处转换为 failed，
//! Job 不会因未捕获的故障永远停在 pending。表级 Mutex 保证读取方看不到半更新的状态。

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::job::{Job, JobId, JobOutcome, JobStatus, JobView};
use super::worker_pool::WorkerPool;
use crate::core::error::{CoreError, Result};

/// 各状态的 Job 数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct JobTable {
    jobs: Mutex<HashMap<JobId, Job>>,
    /// 任一 Job 进入终态时通知
    changed: Condvar,
}

impl JobTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn complete(&self, job_id: &str, outcome: JobOutcome) -> bool {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(job_id) else {
            tracing::warn!("Job {} not found on completion, ignoring", job_id);
            return false;
        };

        let failed = outcome.is_err();
        if !job.finish(outcome) {
            tracing::warn!("Job {} already finished, ignoring second completion", job_id);
            return false;
        }
        drop(jobs);
        self.changed.notify_all();

        if failed {
            tracing::warn!("Job {} failed", job_id);
        } else {
            tracing::info!("Job {} completed", job_id);
        }
        true
    }
}

/// Job 注册表：显式构造、按引用传递的服务对象
pub struct JobRegistry {
    table: Arc<JobTable>,
    pool: WorkerPool,
}

impl JobRegistry {
    pub fn new(worker_pool_size: usize) -> Result<Self> {
        Ok(Self {
            table: Arc::new(JobTable::default()),
            pool: WorkerPool::new(worker_pool_size)?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// 登记一个 pending Job 并立即返回 ID
    pub fn create_job(&self) -> JobId {
        let job = Job::new();
        let id = job.id().to_string();
        self.table.lock().insert(id.clone(), job);
        tracing::info!("Job {} created", id);
        id
    }

    /// 把工作体交给工作池；容量已满时排队
    ///
    /// 工作体返回的错误或 panic 都会被记录为 failed。
    pub fn submit<F>(&self, job_id: &str, work: F)
    where
        F: FnOnce() -> Result<Value> + Send + 'static,
    {
        let table = Arc::clone(&self.table);
        let id = job_id.to_string();
        tracing::info!("Job {} submitted (busy workers: {})", id, self.pool.busy());

        self.pool.execute(work, move |joined| {
            let outcome = match joined {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(e.to_string()),
                Err(panic) => Err(CoreError::WorkerPanicked(panic).to_string()),
            };
            table.complete(&id, outcome);
        });
    }

    /// create_job + submit
    pub fn spawn<F>(&self, work: F) -> JobId
    where
        F: FnOnce() -> Result<Value> + Send + 'static,
    {
        let id = self.create_job();
        self.submit(&id, work);
        id
    }

    /// 写入终态；条目不存在或已是终态时为 no-op，返回 false
    pub fn complete(&self, job_id: &str, outcome: JobOutcome) -> bool {
        self.table.complete(job_id, outcome)
    }

    /// 读取快照；未知 ID 返回 JobNotFound（不与 pending 混淆）
    pub fn get_status(&self, job_id: &str) -> Result<JobView> {
        self.table
            .lock()
            .get(job_id)
            .map(Job::view)
            .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))
    }

    /// 阻塞等待 Job 进入终态，超时返回当时的快照（可能仍是 pending）
    pub fn wait(&self, job_id: &str, timeout: Duration) -> Result<JobView> {
        let deadline = Instant::now() + timeout;
        let mut jobs = self.table.lock();
        loop {
            let view = jobs
                .get(job_id)
                .map(Job::view)
                .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))?;
            let now = Instant::now();
            if view.status.is_terminal() || now >= deadline {
                return Ok(view);
            }
            jobs = self
                .table
                .changed
                .wait_timeout(jobs, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.table.lock();
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_create_job_is_pending() {
        let registry = JobRegistry::new(2).unwrap();
        let id = registry.create_job();
        let view = registry.get_status(&id).unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert!(view.completed_at.is_none());
        assert_eq!(registry.counts().pending, 1);
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let registry = JobRegistry::new(2).unwrap();
        assert_eq!(
            registry.get_status("missing"),
            Err(CoreError::JobNotFound("missing".to_string()))
        );
        assert!(!registry.complete("missing", Ok(json!({}))));
    }

    #[test]
    fn test_complete_twice_keeps_first_state() {
        let registry = JobRegistry::new(2).unwrap();
        let id = registry.create_job();
        assert!(registry.complete(&id, Err("first".to_string())));
        let first = registry.get_status(&id).unwrap();

        assert!(!registry.complete(&id, Ok(json!({"late": true}))));
        let second = registry.get_status(&id).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, JobStatus::Failed);
        assert_eq!(second.error.as_deref(), Some("first"));
    }

    #[test]
    fn test_submitted_work_completes() {
        let registry = JobRegistry::new(2).unwrap();
        let id = registry.spawn(|| Ok(json!({"journey_id": "abc"})));
        let view = registry.wait(&id, WAIT).unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.result, Some(json!({"journey_id": "abc"})));
        assert!(view.completed_at.is_some());
    }

    #[test]
    fn test_work_error_becomes_failed_job() {
        let registry = JobRegistry::new(2).unwrap();
        let id = registry.spawn(|| {
            Err(CoreError::MalformedOutput {
                excerpt: "oops".to_string(),
            })
        });
        let view = registry.wait(&id, WAIT).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.as_deref(), Some("Failed to parse JSON. Raw: oops"));
        assert!(view.result.is_none());
    }

    #[test]
    fn test_panicking_work_becomes_failed_job() {
        let registry = JobRegistry::new(1).unwrap();
        let id = registry.spawn(|| panic!("worker blew up"));
        let view = registry.wait(&id, WAIT).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.error.unwrap().contains("worker blew up"));

        // 工作池仍可继续使用
        let next = registry.spawn(|| Ok(json!(1)));
        assert_eq!(registry.wait(&next, WAIT).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_wait_times_out_on_pending_job() {
        let registry = JobRegistry::new(1).unwrap();
        let id = registry.create_job();
        let view = registry.wait(&id, Duration::from_millis(30)).unwrap();
        assert_eq!(view.status, JobStatus::Pending);
    }
}
