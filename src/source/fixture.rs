// src/source/fixture.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

use crate::feed::types::RawFeedItem;
use crate::source::FeedSource;

/// Replays raw items from a JSON file or from memory. Used for offline runs
/// (`--fixture`) and tests.
pub struct FixtureSource {
    mode: Mode,
}

enum Mode {
    File(PathBuf),
    Inline(Vec<RawFeedItem>),
}

impl FixtureSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::File(path.into()),
        }
    }

    pub fn from_items(items: Vec<RawFeedItem>) -> Self {
        Self {
            mode: Mode::Inline(items),
        }
    }
}

/// Parse a JSON array of raw items; absent fields fall back to defaults.
/// An element that does not decode is skipped on its own.
pub fn parse_raw_items(s: &str) -> Result<Vec<RawFeedItem>> {
    let values: Vec<Value> = serde_json::from_str(s).context("parse raw feed items")?;
    let mut items = Vec::with_capacity(values.len());
    for (idx, v) in values.into_iter().enumerate() {
        match serde_json::from_value(v) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!(target: "source", item = idx + 1, error = %e, "raw item decode failed");
            }
        }
    }
    Ok(items)
}

#[async_trait]
impl FeedSource for FixtureSource {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>> {
        match &self.mode {
            Mode::File(path) => {
                let s = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading fixture {}", path.display()))?;
                parse_raw_items(&s)
            }
            Mode::Inline(items) => Ok(items.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
