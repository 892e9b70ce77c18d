//! weibo-digest — binary entrypoint.
//! Loads config and credentials, wires source/sink/notifier, then runs once
//! or on an interval.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use weibo_digest::config::{DigestConfig, MailCredentials};
use weibo_digest::notify::{email::EmailNotifier, window_label, LogNotifier, Notifier};
use weibo_digest::run::{crawl_instant_now, run_once, run_scheduled};
use weibo_digest::source::{fixture::FixtureSource, weibo_api::WeiboApiSource, FeedSource};
use weibo_digest::store::FsArtifactSink;

#[derive(Debug, Parser)]
#[command(name = "weibo-digest", about = "Mail recent Weibo posts as a JSON digest")]
struct Args {
    /// Config file (TOML or JSON); defaults to $DIGEST_CONFIG_PATH or config/digest.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read raw posts from a JSON file instead of fetching the feed
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Keep running, once per configured interval
    #[arg(long)]
    watch: bool,

    /// Log the digest instead of mailing it; no credentials needed
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(p) => DigestConfig::load_from(p)?,
        None => DigestConfig::load_default()?,
    };

    // Compact console logs by default, JSON lines with LOG_FORMAT=json.
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let _log_guard = weibo_digest::logging::init(&cfg.log_dir, json)?;

    let notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(LogNotifier)
    } else {
        let creds = MailCredentials::from_env().context("mail configuration")?;
        tracing::info!(recipient = %creds.recipient, "mail recipient");
        Box::new(EmailNotifier::new(&cfg, &creds)?)
    };

    let source: Box<dyn FeedSource> = match &args.fixture {
        Some(p) => Box::new(FixtureSource::from_path(p)),
        None => Box::new(WeiboApiSource::from_target_url(
            &cfg.target_url,
            cfg.request_timeout(),
            cfg.utc_offset()?,
        )?),
    };
    let sink = FsArtifactSink::new(&cfg.output_dir);

    tracing::info!(
        url = %cfg.target_url,
        source = source.name(),
        notifier = notifier.name(),
        window = %window_label(cfg.window_secs),
        interval_secs = cfg.interval_secs,
        log_dir = %cfg.log_dir.display(),
        watch = args.watch,
        "weibo-digest starting"
    );

    if args.watch {
        return run_scheduled(&cfg, source.as_ref(), &sink, notifier.as_ref()).await;
    }

    let crawl = crawl_instant_now(cfg.utc_offset()?);
    let summary = run_once(&cfg, source.as_ref(), &sink, notifier.as_ref(), crawl).await?;
    tracing::info!(
        accepted = summary.accepted,
        seen = summary.seen,
        notified = summary.notified,
        "done"
    );
    Ok(())
}
