//! Heat score calculator
//!
//! The heat of a post blends time-decayed engagement with freshness:
//!
//! ```text
//! freshness   = 100 * (1 - t / 7d)             if t <= 7d
//!             = max(0, 100 * (1 - t / 30d))    otherwise, clamped to [0, 100]
//! interaction = likes + 2 * comments + 3 * collects
//! decay       = 1 / ln(floor(t in days) + 2)
//! heat        = max(0, 0.7 * interaction * decay + 0.3 * freshness)
//! ```
//!
//! Freshness restarts at ~76.7 just past the 7 day mark, so the score only
//! decreases monotonically inside each of the two freshness windows.

use chrono::{DateTime, Duration, Utc};

use crate::config::HeatConfig;
use crate::models::{Engagement, Post};

const SECONDS_PER_DAY: i64 = 86_400;

/// Tunable weights of the heat formula
#[derive(Debug, Clone, PartialEq)]
pub struct HeatWeights {
    /// Share of decayed engagement in the final score
    pub interaction: f64,
    /// Share of freshness in the final score
    pub freshness: f64,
    pub like: f64,
    pub comment: f64,
    pub collect: f64,
    /// Freshness falls from 100 to 0 across this window
    pub fresh_window: Duration,
    /// Window of the slower linear decay applied after `fresh_window`
    pub stale_window: Duration,
}

impl Default for HeatWeights {
    fn default() -> Self {
        Self::from(&HeatConfig::default())
    }
}

impl From<&HeatConfig> for HeatWeights {
    fn from(config: &HeatConfig) -> Self {
        Self {
            interaction: config.interaction_weight,
            freshness: config.freshness_weight,
            like: config.like_weight,
            comment: config.comment_weight,
            collect: config.collect_weight,
            fresh_window: window(config.fresh_days),
            stale_window: window(config.stale_days),
        }
    }
}

/// `days` as a duration, saturating instead of overflowing
fn window(days: i64) -> Duration {
    Duration::try_days(days).unwrap_or(Duration::MAX)
}

/// Computes heat scores. Cheap to clone and shared by the forum services.
#[derive(Debug, Clone, Default)]
pub struct HeatCalculator {
    weights: HeatWeights,
}

impl HeatCalculator {
    pub fn new(weights: HeatWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &HeatWeights {
        &self.weights
    }

    /// Recency score in `[0, 100]`
    pub fn freshness(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age = age_seconds(created_at, now);
        let fresh = self.weights.fresh_window.num_seconds() as f64;
        let stale = self.weights.stale_window.num_seconds() as f64;

        let score = if age <= fresh {
            100.0 * (1.0 - age / fresh)
        } else {
            (100.0 * (1.0 - age / stale)).max(0.0)
        };
        score.clamp(0.0, 100.0)
    }

    /// Weighted sum of the engagement counters
    pub fn interaction_score(&self, engagement: Engagement) -> f64 {
        let w = &self.weights;
        w.like * engagement.likes as f64
            + w.comment * engagement.comments as f64
            + w.collect * engagement.collects as f64
    }

    /// `1 / ln(age_days + 2)`, or 1.0 for posts dated in the future
    pub fn time_decay(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - created_at).num_seconds();
        let days = elapsed.div_euclid(SECONDS_PER_DAY) + 1;
        if days > 0 {
            1.0 / ((days + 1) as f64).ln()
        } else {
            1.0
        }
    }

    /// Heat of a post with the given counters, never negative
    pub fn score(&self, engagement: Engagement, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        let heat = w.interaction * self.interaction_score(engagement) * self.time_decay(created_at, now)
            + w.freshness * self.freshness(created_at, now);
        heat.max(0.0)
    }

    pub fn score_post(&self, post: &Post, now: DateTime<Utc>) -> f64 {
        self.score(post.engagement(), post.created_at, now)
    }
}

/// Elapsed seconds with sub-second precision
fn age_seconds(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engagement(likes: i64, comments: i64, collects: i64) -> Engagement {
        Engagement { likes, comments, collects }
    }

    fn calc() -> HeatCalculator {
        HeatCalculator::default()
    }

    #[test]
    fn test_freshness_endpoints() {
        let now = Utc::now();
        let c = calc();

        assert_eq!(c.freshness(now, now), 100.0);
        assert!(c.freshness(now - Duration::days(7), now).abs() < 1e-9);
        let just_past = c.freshness(now - Duration::days(7) - Duration::seconds(1), now);
        assert!((just_past - 100.0 * (1.0 - 7.0 / 30.0)).abs() < 0.01);
        assert_eq!(c.freshness(now - Duration::days(30), now), 0.0);
        assert_eq!(c.freshness(now - Duration::days(400), now), 0.0);
    }

    #[test]
    fn test_future_post_is_clamped() {
        let now = Utc::now();
        let c = calc();
        let future = now + Duration::hours(5);

        assert_eq!(c.freshness(future, now), 100.0);
        assert_eq!(c.time_decay(future - Duration::hours(1), now - Duration::days(2)), 1.0);
    }

    #[test]
    fn test_time_decay_steps_per_day() {
        let now = Utc::now();
        let c = calc();

        let day0 = c.time_decay(now - Duration::hours(23), now);
        assert!((day0 - 1.0 / 2f64.ln()).abs() < 1e-12);
        let day1 = c.time_decay(now - Duration::hours(25), now);
        assert!((day1 - 1.0 / 3f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_interaction_weights() {
        assert_eq!(calc().interaction_score(engagement(1, 1, 1)), 6.0);
        assert_eq!(calc().interaction_score(engagement(10, 0, 0)), 10.0);
    }

    #[test]
    fn test_new_post_has_freshness_only() {
        let now = Utc::now();
        assert!((calc().score(Engagement::default(), now, now) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_liked_new_post_beats_week_old_post() {
        let now = Utc::now();
        let c = calc();
        let a = c.score(engagement(10, 0, 0), now, now);
        let b = c.score(Engagement::default(), now - Duration::days(7), now);

        assert!((a - (7.0 / 2f64.ln() + 30.0)).abs() < 1e-9);
        assert!(a > b);
    }

    #[test]
    fn test_custom_weights() {
        let now = Utc::now();
        let c = HeatCalculator::new(HeatWeights {
            interaction: 1.0,
            freshness: 0.0,
            ..HeatWeights::default()
        });
        let expected = 3.0 / 2f64.ln();
        assert!((c.score(engagement(0, 0, 1), now, now) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_windows_saturate() {
        let config = HeatConfig {
            fresh_days: i64::MAX,
            stale_days: i64::MAX,
            ..HeatConfig::default()
        };
        let weights = HeatWeights::from(&config);
        assert_eq!(weights.fresh_window, Duration::MAX);

        let now = Utc::now();
        let freshness = HeatCalculator::new(weights).freshness(now - Duration::days(1), now);
        assert!((0.0..=100.0).contains(&freshness));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    const WEEK: i64 = 7 * SECONDS_PER_DAY;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn heat_is_never_negative(
            likes in 0i64..10_000,
            comments in 0i64..10_000,
            collects in 0i64..10_000,
            age in -WEEK..(400 * SECONDS_PER_DAY),
        ) {
            let now = Utc::now();
            let created = now - Duration::seconds(age);
            let heat = HeatCalculator::default().score(Engagement { likes, comments, collects }, created, now);
            prop_assert!(heat >= 0.0);
            prop_assert!(heat.is_finite());
        }

        #[test]
        fn freshness_stays_in_range(age in -WEEK..(400 * SECONDS_PER_DAY)) {
            let now = Utc::now();
            let f = HeatCalculator::default().freshness(now - Duration::seconds(age), now);
            prop_assert!((0.0..=100.0).contains(&f));
        }

        #[test]
        fn heat_decreases_within_first_week(
            likes in 0i64..500,
            comments in 0i64..500,
            collects in 0i64..500,
            a in 0i64..=WEEK,
            b in 0i64..=WEEK,
        ) {
            let (younger, older) = if a <= b { (a, b) } else { (b, a) };
            let now = Utc::now();
            let c = HeatCalculator::default();
            let e = Engagement { likes, comments, collects };

            let h_young = c.score(e, now - Duration::seconds(younger), now);
            let h_old = c.score(e, now - Duration::seconds(older), now);
            prop_assert!(h_old <= h_young + 1e-9);
        }

        #[test]
        fn heat_decreases_after_first_week(
            likes in 0i64..500,
            comments in 0i64..500,
            collects in 0i64..500,
            a in (WEEK + 1)..(400 * SECONDS_PER_DAY),
            b in (WEEK + 1)..(400 * SECONDS_PER_DAY),
        ) {
            let (younger, older) = if a <= b { (a, b) } else { (b, a) };
            let now = Utc::now();
            let c = HeatCalculator::default();
            let e = Engagement { likes, comments, collects };

            let h_young = c.score(e, now - Duration::seconds(younger), now);
            let h_old = c.score(e, now - Duration::seconds(older), now);
            prop_assert!(h_old <= h_young + 1e-9);
        }

        #[test]
        fn more_engagement_never_lowers_heat(
            likes in 0i64..500,
            extra in 1i64..50,
            age in 0i64..(60 * SECONDS_PER_DAY),
        ) {
            let now = Utc::now();
            let created = now - Duration::seconds(age);
            let c = HeatCalculator::default();
            let base = c.score(Engagement { likes, comments: 0, collects: 0 }, created, now);
            let more = c.score(Engagement { likes: likes + extra, comments: 0, collects: 0 }, created, now);
            prop_assert!(more >= base);
        }
    }
}
