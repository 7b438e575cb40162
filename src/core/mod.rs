//! 核心层：错误类型、执行底座（常驻事件循环）、编排器

pub mod error;
pub mod orchestrator;
pub mod run_loop;

pub use error::{CoreError, Result};
pub use orchestrator::Orchestrator;
pub use run_loop::{AgentRuntime, DEFAULT_CALL_TIMEOUT};
