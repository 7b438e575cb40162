//! 后台 Job：模型、注册表与有界工作池
//!
//! 调用方提交可能很慢的多步流水线（如学习路径规划）后立即拿到 Job ID，随后轮询状态。

mod job;
mod registry;
mod worker_pool;

pub use job::{Job, JobId, JobOutcome, JobStatus, JobView};
pub use registry::{JobCounts, JobRegistry};
pub use worker_pool::WorkerPool;
