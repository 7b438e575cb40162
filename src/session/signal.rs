//! 诊断完成信号识别
//!
//! Agent 的输出格式无法完全控制，因此把识别当作自由文本上的尽力分类：
//! 一组独立的匹配函数按顺序尝试，首个命中者给出归一化的掌握程度。
//! 默认两条规则，依次为：文本形式的工具调用 `submit_diagnostic(mastery_level="<level>")`
//!（大小写不敏感），以及哨兵词 `DIAGNOSTIC_COMPLETE:<Level>`。

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 掌握程度，只有三种取值；无法识别的标签一律归为 Beginner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MasteryLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// 大小写不敏感地归一化标签，忽略包裹的引号与标点
    pub fn normalize(label: &str) -> Self {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | '.' | '!' | ')' | '`'));
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(cleaned))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// submit_diagnostic 工具的语义：严格校验标签（不合法则 Beginner），返回哨兵信号
pub fn submit_diagnostic(mastery_level: &str) -> String {
    let level = MasteryLevel::ALL
        .into_iter()
        .find(|l| l.as_str() == mastery_level)
        .unwrap_or_default();
    format!("DIAGNOSTIC_COMPLETE:{}", level)
}

/// 单条匹配规则
pub type CompletionMatcher = Box<dyn Fn(&str) -> Option<MasteryLevel> + Send + Sync>;

/// 哨兵词规则：出现即视为完成，紧随冒号后的首个词作为标签
pub fn sentinel_matcher(sentinel: impl Into<String>) -> CompletionMatcher {
    let sentinel = sentinel.into();
    let with_colon = format!("{}:", sentinel);
    Box::new(move |text: &str| {
        if !text.contains(&sentinel) {
            return None;
        }
        let label = text
            .split_once(&with_colon)
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .unwrap_or_default();
        Some(MasteryLevel::normalize(label))
    })
}

/// 工具调用文本规则：`<tool>(mastery_level="<level>")`
pub fn tool_call_matcher(tool_name: &str) -> CompletionMatcher {
    let pattern = format!(
        r#"(?i){}\s*\(\s*mastery_level\s*=\s*["']?(\w+)["']?\s*\)"#,
        regex::escape(tool_name)
    );
    match Regex::new(&pattern) {
        Ok(re) => Box::new(move |text: &str| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| MasteryLevel::normalize(m.as_str()))
        }),
        Err(e) => {
            tracing::error!("Invalid tool call pattern for {}: {}", tool_name, e);
            Box::new(|_: &str| None)
        }
    }
}

/// 完成信号识别器：有序的匹配规则列表，首个命中者胜出
pub struct CompletionDetector {
    sentinel: String,
    matchers: Vec<CompletionMatcher>,
}

impl CompletionDetector {
    /// 默认规则：先工具调用文本，再哨兵词（两者都出现时以工具调用的标签为准）
    pub fn new(sentinel: &str, tool_name: &str) -> Self {
        Self::empty(sentinel)
            .with_matcher(tool_call_matcher(tool_name))
            .with_matcher(sentinel_matcher(sentinel))
    }

    /// 无任何规则的识别器；sentinel 仍用于清理展示文本
    pub fn empty(sentinel: &str) -> Self {
        Self {
            sentinel: sentinel.to_string(),
            matchers: Vec::new(),
        }
    }

    /// 追加一条规则（排在已有规则之后）
    pub fn with_matcher(mut self, matcher: CompletionMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn detect(&self, text: &str) -> Option<MasteryLevel> {
        self.matchers.iter().find_map(|m| m(text))
    }

    /// 去掉哨兵词及其之后的内容，避免部分信号泄漏到对话记录
    pub fn strip_signal<'a>(&self, text: &'a str) -> &'a str {
        match text.find(&self.sentinel) {
            Some(idx) => text[..idx].trim(),
            None => text.trim(),
        }
    }
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new("DIAGNOSTIC_COMPLETE", "submit_diagnostic")
    }
}
