//! 会话层：会话存储、完成信号识别、诊断交接状态机与导师对话

pub mod diagnostic;
pub mod signal;
pub mod store;
pub mod tutor;

pub use diagnostic::{ChatOutcome, DiagnosticFlow, DiagnosticRequest, DiagnosticState};
pub use signal::{
    sentinel_matcher, submit_diagnostic, tool_call_matcher, CompletionDetector, CompletionMatcher,
    MasteryLevel,
};
pub use store::{ConversationSession, SessionId, SessionStore};
pub use tutor::{TutorChat, TutorReply};
