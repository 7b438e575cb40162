//! Agent 层：能力抽象、事件收集、JSON 提取与脚本化 Mock

pub mod json;
pub mod mock;
pub mod traits;

pub use json::{excerpt, extract_json};
pub use mock::{ScriptedAgent, ScriptedReply};
pub use traits::{
    collect_response, AgentClient, AgentError, AgentEvent, AgentVariant, ConversationHandle,
    EventStream,
};
