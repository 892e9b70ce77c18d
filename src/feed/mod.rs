// src/feed/mod.rs
pub mod artifact;
pub mod types;

use chrono::{Duration, NaiveDateTime, SubsecRound};

use crate::feed::artifact::Digest;
use crate::feed::types::{NormalizedFeedItem, RawFeedItem};
use crate::timeparse::{self, NormalizationFailure, UNKNOWN_TIME};

/// Why an item was left out of the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Unparsed(NormalizationFailure),
    TooOld,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Unparsed(f) => f.reason(),
            DropReason::TooOld => "too_old",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedItem {
    /// 0-based position in the extracted sequence.
    pub index: usize,
    pub raw_post_time: String,
    pub reason: DropReason,
}

/// Result of one filter pass. `accepted` keeps extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub accepted: Vec<NormalizedFeedItem>,
    pub dropped: Vec<DroppedItem>,
}

impl FilterOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// Render the accepted items into the run artifact.
    pub fn to_digest(&self) -> anyhow::Result<Digest> {
        Digest::build(&self.accepted)
    }
}

/// Freshness predicate bound to one run's crawl instant.
///
/// The crawl instant is truncated to whole seconds so every timestamp that
/// leaves the filter survives the artifact's `HH:MM:SS` rendering.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessFilter {
    crawl_instant: NaiveDateTime,
    threshold: NaiveDateTime,
}

impl FreshnessFilter {
    pub fn new(crawl_instant: NaiveDateTime, window: Duration) -> Self {
        let crawl_instant = crawl_instant.trunc_subsecs(0);
        let threshold = crawl_instant
            .checked_sub_signed(window)
            .unwrap_or(NaiveDateTime::MIN);
        Self {
            crawl_instant,
            threshold,
        }
    }

    pub fn crawl_instant(&self) -> NaiveDateTime {
        self.crawl_instant
    }

    /// Oldest publish time still accepted (inclusive).
    pub fn threshold(&self) -> NaiveDateTime {
        self.threshold
    }

    /// Resolve one raw time string and decide whether it is fresh.
    pub fn evaluate(&self, raw_post_time: &str) -> Result<NaiveDateTime, DropReason> {
        let post = timeparse::normalize(raw_post_time, self.crawl_instant)
            .map_err(DropReason::Unparsed)?;
        if post < self.threshold {
            return Err(DropReason::TooOld);
        }
        Ok(post)
    }

    /// Normalize and filter `raw_items` in order. A bad item only drops itself.
    pub fn apply(&self, raw_items: Vec<RawFeedItem>) -> FilterOutcome {
        let mut out = FilterOutcome {
            accepted: Vec::with_capacity(raw_items.len()),
            dropped: Vec::new(),
        };

        for (index, mut item) in raw_items.into_iter().enumerate() {
            let raw_time = item
                .raw_post_time
                .take()
                .unwrap_or_else(|| UNKNOWN_TIME.to_string());

            match self.evaluate(&raw_time) {
                Ok(post) => {
                    out.accepted.push(NormalizedFeedItem::from_raw(
                        item,
                        raw_time,
                        post,
                        self.crawl_instant,
                    ));
                }
                Err(reason) => {
                    tracing::debug!(
                        target: "digest",
                        item = index + 1,
                        raw_post_time = %raw_time,
                        reason = reason.as_str(),
                        "item skipped"
                    );
                    out.dropped.push(DroppedItem {
                        index,
                        raw_post_time: raw_time,
                        reason,
                    });
                }
            }
        }

        out
    }
}

/// One-shot helper: filter `raw_items` against `crawl_instant - window`.
pub fn filter_fresh(
    crawl_instant: NaiveDateTime,
    window: Duration,
    raw_items: Vec<RawFeedItem>,
) -> FilterOutcome {
    FreshnessFilter::new(crawl_instant, window).apply(raw_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn item(t: Option<&str>, content: &str) -> RawFeedItem {
        RawFeedItem {
            raw_post_time: t.map(str::to_string),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let f = FreshnessFilter::new(noon(), Duration::hours(5));
        assert_eq!(f.threshold(), noon() - Duration::hours(5));
        assert!(f.evaluate("5小时前").is_ok());
        assert!(f.evaluate("今天 07:00").is_ok());
        assert_eq!(f.evaluate("今天 06:59"), Err(DropReason::TooOld));
    }

    #[test]
    fn one_second_before_threshold_is_dropped() {
        let crawl = noon() + Duration::seconds(1);
        let f = FreshnessFilter::new(crawl, Duration::hours(5));
        // threshold 07:00:01, so 07:00:00 is just outside
        assert_eq!(f.evaluate("今天 07:00"), Err(DropReason::TooOld));
    }

    #[test]
    fn missing_time_is_dropped_not_defaulted() {
        let out = filter_fresh(noon(), Duration::hours(5), vec![item(None, "x")]);
        assert!(out.accepted.is_empty());
        assert_eq!(
            out.dropped[0].reason,
            DropReason::Unparsed(NormalizationFailure::Missing)
        );
        assert_eq!(out.dropped[0].raw_post_time, UNKNOWN_TIME);
    }

    #[test]
    fn keeps_extraction_order() {
        let items = vec![
            item(Some("2小时前"), "a"),
            item(Some("刚刚"), "b"),
            item(Some("今天 11:00"), "c"),
        ];
        let out = filter_fresh(noon(), Duration::hours(5), items);
        let contents: Vec<_> = out.accepted.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert!(out.accepted.iter().all(|i| i.crawl_instant == noon()));
    }

    #[test]
    fn subsecond_crawl_instant_is_truncated() {
        let crawl = noon() + Duration::milliseconds(750);
        let out = filter_fresh(crawl, Duration::hours(1), vec![item(Some("刚刚"), "a")]);
        assert_eq!(out.accepted[0].post_instant, noon());
        assert_eq!(out.accepted[0].crawl_instant, noon());
    }

    #[test]
    fn empty_input_yields_empty_outcome() {
        let out = filter_fresh(noon(), Duration::hours(5), Vec::new());
        assert_eq!(out, FilterOutcome::default());
        assert_eq!(out.accepted_count(), 0);
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let f = FreshnessFilter::new(noon(), Duration::MAX);
        assert_eq!(f.threshold(), NaiveDateTime::MIN);
        assert!(f.evaluate("1999-01-01 00:00").is_ok());
    }
}
