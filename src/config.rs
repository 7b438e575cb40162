//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PATHWISE__*` 覆盖（双下划线表示嵌套，如 `PATHWISE__JOBS__WORKER_POOL_SIZE=16`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub jobs: JobsSection,
    #[serde(default)]
    pub diagnostic: DiagnosticSection,
    #[serde(default)]
    pub tutor: TutorSection,
}

/// [runtime] 段：常驻事件循环的阻塞调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// run_blocking 的等待上限（秒）；超时只释放调用线程，不取消任务
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl RuntimeSection {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    120
}

/// [jobs] 段：工作池容量、失败摘录长度
#[derive(Debug, Clone, Deserialize)]
pub struct JobsSection {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// 解析失败时错误信息中保留的原始输出字符数
    #[serde(default = "default_error_excerpt_chars")]
    pub error_excerpt_chars: usize,
}

impl Default for JobsSection {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            error_excerpt_chars: default_error_excerpt_chars(),
        }
    }
}

fn default_worker_pool_size() -> usize {
    8
}

fn default_error_excerpt_chars() -> usize {
    300
}

/// [diagnostic] 段：完成信号的哨兵词与工具名
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticSection {
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
}

impl Default for DiagnosticSection {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            tool_name: default_tool_name(),
        }
    }
}

fn default_sentinel() -> String {
    "DIAGNOSTIC_COMPLETE".to_string()
}

fn default_tool_name() -> String {
    "submit_diagnostic".to_string()
}

/// [tutor] 段
#[derive(Debug, Clone, Deserialize)]
pub struct TutorSection {
    /// 导师返回空文本时的兜底回复
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for TutorSection {
    fn default() -> Self {
        Self {
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_fallback_reply() -> String {
    "I'm sorry, I couldn't process that. Could you please rephrase your question?".to_string()
}

/// 从 config 目录加载配置，环境变量 PATHWISE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PATHWISE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PATHWISE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
