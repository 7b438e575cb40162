//! 学习路径规划流水线（Job 工作体）
//!
//! 两种模式：TOPIC（话题 + 掌握程度）与 SYLLABUS（原始大纲文本）。每次规划打开一段新的规划器对话，
//! 经由常驻事件循环调用 Agent，再把回复防御性地解析为 JSON 对象；缺少 journey_id 时补一个。

use std::sync::Arc;

use serde_json::Value;

use crate::agent::{excerpt, extract_json, AgentClient, AgentVariant};
use crate::core::error::{CoreError, Result};
use crate::core::run_loop::AgentRuntime;
use crate::session::MasteryLevel;

pub fn topic_prompt(topic: &str, level: MasteryLevel) -> String {
    format!("Mode: TOPIC. Topic: {}. User Level: {}.", topic, level)
}

pub fn syllabus_prompt(syllabus: &str) -> String {
    format!("Mode: SYLLABUS. Input Text:\n\n{}", syllabus)
}

/// 把规划器回复解析为路径图 JSON 对象
pub fn parse_journey(reply: &str, excerpt_chars: usize) -> Result<Value> {
    match extract_json(reply) {
        Some(Value::Object(mut map)) => {
            if !map.contains_key("journey_id") {
                map.insert(
                    "journey_id".to_string(),
                    Value::String(uuid::Uuid::new_v4().to_string()),
                );
            }
            Ok(Value::Object(map))
        }
        _ => Err(CoreError::MalformedOutput {
            excerpt: excerpt(reply, excerpt_chars).to_string(),
        }),
    }
}

pub struct JourneyPlanner {
    runtime: Arc<AgentRuntime>,
    agent: Arc<dyn AgentClient>,
    excerpt_chars: usize,
}

impl JourneyPlanner {
    pub fn new(runtime: Arc<AgentRuntime>, agent: Arc<dyn AgentClient>, excerpt_chars: usize) -> Self {
        Self {
            runtime,
            agent,
            excerpt_chars,
        }
    }

    pub fn plan_topic(&self, topic: &str, level: MasteryLevel) -> Result<Value> {
        tracing::info!("Planning journey for topic '{}' (level: {})", topic, level);
        self.plan(&topic_prompt(topic, level))
    }

    pub fn plan_syllabus(&self, syllabus: &str) -> Result<Value> {
        tracing::info!("Planning journey from syllabus ({} chars)", syllabus.chars().count());
        self.plan(&syllabus_prompt(syllabus))
    }

    fn plan(&self, prompt: &str) -> Result<Value> {
        let conversation = self
            .runtime
            .open_conversation(&self.agent, AgentVariant::JourneyPlanner)?;
        let reply = self.runtime.invoke(&self.agent, &conversation, prompt)?;
        parse_journey(&reply, self.excerpt_chars)
    }
}
