//! 间隔重复调度（简化 SM-2）
//!
//! 纯函数：(当前调度状态, 回忆质量 0-5, 评估时间) → 新调度状态，无 I/O、无隐藏状态。
//!
//! - 质量 < 3：step 归零，interval = 1 天，ease 不变
//! - 质量 ≥ 3：step + 1；interval 依次为 1、6，之后为 round(上次 interval × ease)；
//!   ease += 0.1 - (5-q)×(0.08 + (5-q)×0.02)，下限 1.3
//! - interval 上限 MAX_INTERVAL_DAYS；next_review = 评估时间 + interval 天（超出日期范围时取最大值）
//! - review_count 总是 + 1

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, Result};

pub const INITIAL_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;
/// 间隔上限（约 100 年）
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// 回忆质量：0 完全遗忘 … 5 完美回忆
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RecallQuality(u8);

impl RecallQuality {
    pub const MAX: u8 = 5;

    pub fn new(quality: u8) -> Result<Self> {
        if quality > Self::MAX {
            return Err(CoreError::InvalidQuality(quality));
        }
        Ok(Self(quality))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// 质量 ≥ 3 视为成功回忆
    pub fn is_pass(self) -> bool {
        self.0 >= 3
    }

    pub fn all() -> impl Iterator<Item = RecallQuality> {
        (0..=Self::MAX).map(Self)
    }
}

impl TryFrom<u8> for RecallQuality {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RecallQuality> for u8 {
    fn from(q: RecallQuality) -> u8 {
        q.0
    }
}

/// 单张卡片的调度状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSchedule {
    /// 连续成功回忆次数
    pub step: u32,
    /// 间隔天数
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
    pub review_count: u32,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
}

impl FlashcardSchedule {
    /// 新卡片：立即到期
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            step: 0,
            interval: 0,
            ease_factor: INITIAL_EASE,
            next_review: now,
            review_count: 0,
            last_review: None,
        }
    }

    /// 根据一次复习计算下一个调度状态
    pub fn review(&self, quality: RecallQuality, now: DateTime<Utc>) -> Self {
        let (step, interval, ease_factor) = if quality.is_pass() {
            let interval = match self.step {
                0 => 1,
                1 => 6,
                _ => ((f64::from(self.interval) * self.ease_factor).round() as u32).max(1),
            }
            .min(MAX_INTERVAL_DAYS);
            let miss = f64::from(RecallQuality::MAX - quality.value());
            let ease = self.ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
            (self.step.saturating_add(1), interval, ease.max(MIN_EASE))
        } else {
            (0, 1, self.ease_factor)
        };

        Self {
            step,
            interval,
            ease_factor,
            next_review: now
                .checked_add_signed(Duration::days(i64::from(interval)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            review_count: self.review_count.saturating_add(1),
            last_review: Some(now),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    fn q(v: u8) -> RecallQuality {
        RecallQuality::new(v).unwrap()
    }

    #[test]
    fn test_new_schedule() {
        let s = FlashcardSchedule::new(t0());
        assert_eq!(s.step, 0);
        assert_eq!(s.interval, 0);
        assert_eq!(s.ease_factor, INITIAL_EASE);
        assert_eq!(s.next_review, t0());
        assert_eq!(s.review_count, 0);
        assert!(s.is_due(t0()));
    }

    #[test]
    fn test_three_perfect_reviews() {
        let s0 = FlashcardSchedule::new(t0());
        let s1 = s0.review(q(5), t0());
        let s2 = s1.review(q(5), t0());
        let s3 = s2.review(q(5), t0());

        assert_eq!(s1.interval, 1);
        assert_eq!(s2.interval, 6);
        assert_eq!(s3.interval, (6.0 * s2.ease_factor).round() as u32);
        assert_eq!(s3.interval, 16);
        assert!(s0.ease_factor <= s1.ease_factor);
        assert!(s1.ease_factor <= s2.ease_factor);
        assert!(s2.ease_factor <= s3.ease_factor);
        assert_eq!((s1.step, s2.step, s3.step), (1, 2, 3));
        assert_eq!(s3.review_count, 3);
    }

    #[test]
    fn test_failure_resets_interval_and_keeps_ease() {
        let mut s = FlashcardSchedule::new(t0());
        for v in [5, 4, 5, 3] {
            s = s.review(q(v), t0());
        }
        let before = s.ease_factor;
        let failed = s.review(q(0), t0());
        assert_eq!(failed.step, 0);
        assert_eq!(failed.interval, 1);
        assert_eq!(failed.ease_factor, before);
        assert_eq!(failed.review_count, 5);
        assert_eq!(failed.next_review, t0() + Duration::days(1));
    }

    #[test]
    fn test_ease_floor() {
        let mut s = FlashcardSchedule::new(t0());
        for _ in 0..50 {
            s = s.review(q(0), t0());
            assert!(s.ease_factor >= MIN_EASE);
        }
        assert_eq!(s.ease_factor, INITIAL_EASE);

        for _ in 0..50 {
            s = s.review(q(3), t0());
            assert!(s.ease_factor >= MIN_EASE);
        }
        assert_eq!(s.ease_factor, MIN_EASE);
    }

    #[test]
    fn test_ease_deltas_per_quality() {
        let s = FlashcardSchedule::new(t0());
        let delta = |v: u8| s.review(q(v), t0()).ease_factor - INITIAL_EASE;
        assert!((delta(5) - 0.1).abs() < 1e-9);
        assert!(delta(4).abs() < 1e-9);
        assert!((delta(3) + 0.14).abs() < 1e-9);
        for v in 0..3 {
            assert_eq!(delta(v), 0.0);
        }
    }

    #[test]
    fn test_next_review_uses_evaluation_time() {
        let s = FlashcardSchedule::new(t0());
        let later = t0() + Duration::days(3);
        let s1 = s.review(q(4), later);
        assert_eq!(s1.next_review, later + Duration::days(1));
        assert_eq!(s1.last_review, Some(later));
        assert!(!s1.is_due(later));
        assert!(s1.is_due(later + Duration::days(1)));
    }

    #[test]
    fn test_total_over_all_qualities() {
        // 任意历史之后，任意质量都得到合法状态
        let mut s = FlashcardSchedule::new(t0());
        for round in 0..20u8 {
            for quality in RecallQuality::all() {
                let next = s.review(quality, t0());
                assert!(next.ease_factor >= MIN_EASE);
                assert!(next.interval >= 1);
                assert_eq!(next.review_count, s.review_count + 1);
                if quality.is_pass() {
                    assert_eq!(next.step, s.step + 1);
                } else {
                    assert_eq!(next.step, 0);
                }
            }
            s = s.review(q(round % 6), t0());
        }
    }

    #[test]
    fn test_long_streak_stays_in_range() {
        let mut s = FlashcardSchedule::new(t0());
        for _ in 0..100 {
            let next = s.review(q(5), t0());
            assert!(next.interval >= s.interval);
            assert!(next.interval <= MAX_INTERVAL_DAYS);
            s = next;
        }
        assert_eq!(s.interval, MAX_INTERVAL_DAYS);
        assert_eq!(s.review_count, 100);
        assert_eq!(s.next_review, t0() + Duration::days(i64::from(MAX_INTERVAL_DAYS)));
    }

    #[test]
    fn test_review_near_date_limit_saturates() {
        let mut s = FlashcardSchedule::new(t0());
        for _ in 0..3 {
            s = s.review(q(5), t0());
        }
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let next = s.review(q(5), late);
        assert_eq!(next.next_review, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_quality_range() {
        assert!(RecallQuality::new(5).is_ok());
        assert_eq!(RecallQuality::new(6), Err(CoreError::InvalidQuality(6)));
        assert!(serde_json::from_str::<RecallQuality>("9").is_err());
        assert_eq!(serde_json::from_str::<RecallQuality>("4").unwrap().value(), 4);
    }
}
