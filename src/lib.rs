//! Pathwise - 学习平台的异步编排底座
//!
//! 模块划分：
//! - **agent**: Agent 能力抽象（对话 / 事件流）、回复收集、JSON 提取、脚本化 Mock
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、常驻事件循环（同步 → 异步桥接）、编排器
//! - **jobs**: 后台 Job 注册表与有界工作池
//! - **journey**: 学习路径规划流水线（TOPIC / SYLLABUS）
//! - **observability**: tracing 初始化
//! - **session**: 会话存储、完成信号检测、诊断状态机、导师对话
//! - **srs**: SM-2 间隔重复调度与闪卡到期选择

pub mod agent;
pub mod config;
pub mod core;
pub mod jobs;
pub mod journey;
pub mod observability;
pub mod session;
pub mod srs;

pub use crate::config::{load_config, AppConfig};
pub use crate::core::{CoreError, Orchestrator, Result};
