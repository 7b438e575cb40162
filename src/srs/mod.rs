//! 间隔重复：SM-2 调度与闪卡到期选择

pub mod deck;
pub mod schedule;

pub use deck::{deck_stats, due_cards, DeckStats, Flashcard};
pub use schedule::{FlashcardSchedule, RecallQuality, INITIAL_EASE, MAX_INTERVAL_DAYS, MIN_EASE};
