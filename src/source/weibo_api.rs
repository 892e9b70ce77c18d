// src/source/weibo_api.rs
//! Fetches a profile's latest posts from the mobile Weibo container API.
//!
//! Each post card becomes one [`RawFeedItem`]. The core only needs raw
//! strings, so this module stays lenient: a card that does not look like a
//! post, or fails to decode, is skipped on its own.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::feed::types::RawFeedItem;
use crate::source::{extract_links, normalize_text, FeedSource, WEIBO_MOBILE_HOST};

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Card type the container API uses for a post.
const POST_CARD: i64 = 9;

/// Absolute timestamps the API sometimes returns instead of display strings.
const API_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    #[serde(default)]
    ok: i64,
    #[serde(default)]
    data: Option<ContainerData>,
}

#[derive(Debug, Deserialize)]
struct ContainerData {
    #[serde(default)]
    cards: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Card {
    #[serde(default)]
    card_type: i64,
    #[serde(default)]
    mblog: Option<Mblog>,
}

#[derive(Debug, Deserialize)]
struct Mblog {
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attitudes_count: Option<Value>,
    #[serde(default)]
    comments_count: Option<Value>,
    #[serde(default)]
    reposts_count: Option<Value>,
    #[serde(default)]
    bid: Option<String>,
    #[serde(default)]
    id: Option<Value>,
}

pub struct WeiboApiSource {
    uid: String,
    client: Client,
    offset: FixedOffset,
}

impl WeiboApiSource {
    /// `target_url` is a profile URL such as `https://m.weibo.cn/u/1812511224`.
    pub fn from_target_url(target_url: &str, timeout: Duration, offset: FixedOffset) -> Result<Self> {
        let uid = uid_from_target_url(target_url)
            .ok_or_else(|| anyhow!("no profile uid in target url {target_url}"))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(MOBILE_UA)
            .build()
            .context("build http client")?;
        Ok(Self {
            uid,
            client,
            offset,
        })
    }

    fn container_url(&self) -> String {
        format!(
            "{WEIBO_MOBILE_HOST}/api/container/getIndex?type=uid&value={uid}&containerid=107603{uid}",
            uid = self.uid
        )
    }
}

#[async_trait]
impl FeedSource for WeiboApiSource {
    async fn fetch(&self) -> Result<Vec<RawFeedItem>> {
        let url = self.container_url();
        let body = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .header(header::REFERER, format!("{WEIBO_MOBILE_HOST}/u/{}", self.uid))
            .send()
            .await
            .context("fetch weibo container")?
            .error_for_status()
            .context("weibo container non-2xx")?
            .text()
            .await
            .context("read weibo container body")?;

        let items = parse_container(&body, self.offset)?;
        tracing::info!(target: "source", uid = %self.uid, cards = items.len(), "feed page loaded");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "weibo-api"
    }
}

/// Profile uid from `/u/<digits>` or a `uid=<digits>` query.
pub fn uid_from_target_url(url: &str) -> Option<String> {
    static RE_UID: OnceCell<Regex> = OnceCell::new();
    let re = RE_UID.get_or_init(|| Regex::new(r"(?:/u/|[?&](?:uid|value)=)(\d+)").unwrap());
    re.captures(url).map(|c| c[1].to_string())
}

/// Decode one container response body into raw items, skipping non-post cards.
pub fn parse_container(body: &str, offset: FixedOffset) -> Result<Vec<RawFeedItem>> {
    let resp: ContainerResponse =
        serde_json::from_str(body).context("parse weibo container json")?;
    if resp.ok != 1 {
        bail!("weibo container returned ok={}", resp.ok);
    }
    let cards = resp.data.map(|d| d.cards).unwrap_or_default();

    let mut items = Vec::with_capacity(cards.len());
    for (idx, raw_card) in cards.into_iter().enumerate() {
        let card: Card = match serde_json::from_value(raw_card) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "source", card = idx + 1, error = %e, "card decode failed");
                continue;
            }
        };
        if card.card_type != POST_CARD {
            continue;
        }
        let Some(mblog) = card.mblog else {
            tracing::debug!(target: "source", card = idx + 1, "post card without mblog");
            continue;
        };
        items.push(raw_item_from_mblog(mblog, offset));
    }
    Ok(items)
}

fn raw_item_from_mblog(m: Mblog, offset: FixedOffset) -> RawFeedItem {
    let html = m.text.unwrap_or_default();
    let post_key = m
        .bid
        .filter(|b| !b.is_empty())
        .or_else(|| m.id.as_ref().and_then(display_value));

    RawFeedItem {
        raw_post_time: m.created_at.map(|t| display_time(&t, offset)),
        content: normalize_text(&html),
        like_count: count_display(m.attitudes_count.as_ref()),
        comment_count: count_display(m.comments_count.as_ref()),
        forward_count: count_display(m.reposts_count.as_ref()),
        link: post_key.map(|k| format!("{WEIBO_MOBILE_HOST}/status/{k}")),
        content_links: extract_links(&html),
    }
}

/// Absolute API timestamps become `YYYY-MM-DD HH:MM` in the feed's offset;
/// display strings ("5分钟前") pass through untouched.
///
/// Seconds are dropped on purpose: the feed's own absolute strings carry
/// minutes only, and the normalizer works at minute precision, so an API post
/// is judged exactly like the same post rendered on the page.
fn display_time(raw: &str, offset: FixedOffset) -> String {
    match DateTime::parse_from_str(raw.trim(), API_TIME_FORMAT) {
        Ok(dt) => dt.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn display_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_display(v: Option<&Value>) -> String {
    v.and_then(display_value).unwrap_or_else(|| "0".to_string())
}
