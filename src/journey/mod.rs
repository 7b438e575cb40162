//! 学习路径规划：TOPIC / SYLLABUS 两种模式的 Job 工作体

mod planner;

pub use planner::{parse_journey, syllabus_prompt, topic_prompt, JourneyPlanner};
