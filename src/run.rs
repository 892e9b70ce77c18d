// src/run.rs
//! One digest run, and the interval loop that repeats it.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDateTime, SubsecRound, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::config::DigestConfig;
use crate::feed::artifact::artifact_name;
use crate::feed::types::NormalizedFeedItem;
use crate::feed::FreshnessFilter;
use crate::notify::{window_label, DigestReport, Notifier};
use crate::source::FeedSource;
use crate::store::ArtifactSink;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Digest runs started.");
        describe_counter!("digest_items_seen_total", "Raw posts handed over by the source.");
        describe_counter!("digest_accepted_total", "Posts inside the freshness window.");
        describe_counter!(
            "digest_dropped_total",
            "Posts left out, labelled by reason (too_old, missing, malformed, unrecognized_format)."
        );
        describe_counter!("digest_source_errors_total", "Source fetch/parse errors.");
        describe_counter!("digest_notify_errors_total", "Artifact store or mail failures.");
        describe_gauge!("digest_last_run_ts", "Unix ts when the last digest run finished.");
    });
}

/// What happened in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub crawl_instant: NaiveDateTime,
    pub seen: usize,
    pub accepted: usize,
    /// Where the artifact was stored, if anything was accepted and the store worked.
    pub stored_at: Option<String>,
    pub notified: bool,
}

/// "Now" in the feed's frame, whole seconds.
pub fn crawl_instant_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local().trunc_subsecs(0)
}

/// Fetch, filter, store and notify once, judging every post against `crawl_instant`.
///
/// A source failure fails the run. Store and mail failures are logged and
/// reported through the summary; an empty digest stores and mails nothing.
pub async fn run_once(
    cfg: &DigestConfig,
    source: &dyn FeedSource,
    sink: &dyn ArtifactSink,
    notifier: &dyn Notifier,
    crawl_instant: NaiveDateTime,
) -> Result<RunSummary> {
    ensure_metrics_described();
    counter!("digest_runs_total").increment(1);

    let raw = match source.fetch().await {
        Ok(v) => v,
        Err(e) => {
            counter!("digest_source_errors_total").increment(1);
            return Err(e).with_context(|| format!("source {} failed", source.name()));
        }
    };
    let seen = raw.len();
    counter!("digest_items_seen_total").increment(seen as u64);
    tracing::debug!(target: "digest", source = source.name(), cards = seen, "raw posts fetched");

    let filter = FreshnessFilter::new(crawl_instant, cfg.window());
    let outcome = filter.apply(raw);
    for d in &outcome.dropped {
        counter!("digest_dropped_total", "reason" => d.reason.as_str()).increment(1);
    }
    counter!("digest_accepted_total").increment(outcome.accepted_count() as u64);

    let window = window_label(cfg.window_secs);
    tracing::info!(
        target: "digest",
        window = %window,
        seen,
        accepted = outcome.accepted_count(),
        dropped = outcome.dropped.len(),
        "crawl finished"
    );

    let mut summary = RunSummary {
        crawl_instant: filter.crawl_instant(),
        seen,
        accepted: outcome.accepted_count(),
        stored_at: None,
        notified: false,
    };

    if outcome.accepted.is_empty() {
        tracing::warn!(target: "digest", window = %window, "no new posts inside the window");
        finish_run();
        return Ok(summary);
    }

    let digest = outcome.to_digest()?;
    let name = artifact_name(summary.crawl_instant);
    match sink.store(&name, &digest.artifact).await {
        Ok(at) => {
            tracing::info!(target: "digest", path = %at, "digest saved");
            summary.stored_at = Some(at);
        }
        Err(e) => {
            counter!("digest_notify_errors_total").increment(1);
            tracing::error!(target: "digest", error = %format!("{e:#}"), "saving digest failed");
        }
    }

    log_accepted(&outcome.accepted);

    let report = DigestReport {
        crawl_instant: summary.crawl_instant,
        window_secs: cfg.window_secs,
        accepted_count: digest.accepted_count,
        artifact_name: name,
        artifact: digest.artifact,
    };
    match notifier.send_digest(&report).await {
        Ok(()) => summary.notified = true,
        Err(e) => {
            counter!("digest_notify_errors_total").increment(1);
            tracing::error!(
                target: "notify",
                notifier = notifier.name(),
                error = %format!("{e:#}"),
                "digest mail failed"
            );
        }
    }

    finish_run();
    Ok(summary)
}

fn finish_run() {
    gauge!("digest_last_run_ts").set(Utc::now().timestamp() as f64);
}

fn log_accepted(items: &[NormalizedFeedItem]) {
    for (i, it) in items.iter().enumerate() {
        tracing::info!(
            target: "digest",
            post = i + 1,
            raw_time = %it.raw_post_time,
            at = %it.post_instant.format("%Y-%m-%d %H:%M:%S"),
            likes = %it.like_count,
            comments = %it.comment_count,
            forwards = %it.forward_count,
            link = it.link.as_deref().unwrap_or(""),
            content = %it.content,
            "accepted post"
        );
    }
}

/// Run forever, once per `interval_secs`. Failed ticks are logged and skipped.
pub async fn run_scheduled(
    cfg: &DigestConfig,
    source: &dyn FeedSource,
    sink: &dyn ArtifactSink,
    notifier: &dyn Notifier,
) -> Result<()> {
    let offset = cfg.utc_offset()?;
    let mut ticker = tokio::time::interval(cfg.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let crawl = crawl_instant_now(offset);
        match run_once(cfg, source, sink, notifier, crawl).await {
            Ok(s) => tracing::info!(
                target: "digest",
                accepted = s.accepted,
                notified = s.notified,
                next_in_secs = cfg.interval_secs,
                "run complete"
            ),
            Err(e) => tracing::warn!(target: "digest", error = %format!("{e:#}"), "run failed"),
        }
    }
}
