//! 闪卡与到期选择

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::{FlashcardSchedule, RecallQuality};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub journey_id: Option<String>,
    #[serde(default)]
    pub node_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub schedule: FlashcardSchedule,
}

impl Flashcard {
    pub fn new(front: impl Into<String>, back: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            front: front.into(),
            back: back.into(),
            tags: Vec::new(),
            journey_id: None,
            node_id: None,
            created_at: now,
            schedule: FlashcardSchedule::new(now),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// 关联到学习路径中的某个节点
    pub fn for_node(mut self, journey_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        self.journey_id = Some(journey_id.into());
        self.node_id = Some(node_id.into());
        self
    }

    pub fn review(&mut self, quality: RecallQuality, now: DateTime<Utc>) {
        self.schedule = self.schedule.review(quality, now);
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_due(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeckStats {
    pub total: usize,
    pub due: usize,
}

/// 最多 `limit` 张已到期卡片，最早到期的在前
pub fn due_cards(cards: &[Flashcard], now: DateTime<Utc>, limit: usize) -> Vec<&Flashcard> {
    let mut due: Vec<&Flashcard> = cards.iter().filter(|c| c.is_due(now)).collect();
    due.sort_by_key(|c| c.schedule.next_review);
    due.truncate(limit);
    due
}

pub fn deck_stats(cards: &[Flashcard], now: DateTime<Utc>) -> DeckStats {
    DeckStats {
        total: cards.len(),
        due: cards.iter().filter(|c| c.is_due(now)).count(),
    }
}
