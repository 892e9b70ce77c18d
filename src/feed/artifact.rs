// src/feed/artifact.rs
//! The run artifact: a pretty-printed JSON array of accepted posts.
//!
//! Four-space indent, non-ASCII kept verbatim, keys in declaration order of
//! [`NormalizedFeedItem`]. [`parse`] reads it back into the same items.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::feed::types::NormalizedFeedItem;

const INDENT: &[u8] = b"    ";

/// Serialized digest of one run, ready for the sink and the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub artifact: String,
    pub accepted_count: usize,
}

impl Digest {
    pub fn build(items: &[NormalizedFeedItem]) -> Result<Self> {
        Ok(Self {
            artifact: render(items)?,
            accepted_count: items.len(),
        })
    }
}

pub fn render(items: &[NormalizedFeedItem]) -> Result<String> {
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    items.serialize(&mut ser).context("serialize digest")?;
    String::from_utf8(buf).context("digest is not utf-8")
}

pub fn parse(s: &str) -> Result<Vec<NormalizedFeedItem>> {
    serde_json::from_str(s).context("parse digest artifact")
}

/// Run-stamped file name, e.g. `weibo_data_20240101_120000.json`.
pub fn artifact_name(crawl_instant: NaiveDateTime) -> String {
    format!("weibo_data_{}.json", crawl_instant.format("%Y%m%d_%H%M%S"))
}
