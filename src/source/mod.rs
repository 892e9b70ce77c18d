// src/source/mod.rs
pub mod fixture;
pub mod weibo_api;

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::feed::types::{ContentLink, RawFeedItem};

pub const WEIBO_MOBILE_HOST: &str = "https://m.weibo.cn";

/// Display text recorded for anchors without visible text.
pub const NO_LINK_TEXT: &str = "无文本";

/// Anything that can hand the pipeline one run's worth of raw posts.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Posts in document order. An empty list is a valid answer.
    async fn fetch(&self) -> Result<Vec<RawFeedItem>>;
    fn name(&self) -> &'static str;
}

/// Host-qualify site-relative links (`/status/1` → `https://m.weibo.cn/status/1`).
pub fn qualify_link(href: &str) -> String {
    let href = href.trim();
    if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{WEIBO_MOBILE_HOST}{href}")
    } else {
        href.to_string()
    }
}

/// Post HTML to plain text: line breaks kept, tags dropped, entities decoded,
/// runs of blanks folded.
pub fn normalize_text(s: &str) -> String {
    static RE_BR: OnceCell<Regex> = OnceCell::new();
    let re_br = RE_BR.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    let out = re_br.replace_all(s, "\n");

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&out, "");

    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    static RE_BLANKS: OnceCell<Regex> = OnceCell::new();
    let re_blanks = RE_BLANKS.get_or_init(|| Regex::new(r"[ \t\r\f]+").unwrap());
    out.lines()
        .map(|l| re_blanks.replace_all(l, " ").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every `<a href>` in `html`, in document order, hrefs host-qualified.
pub fn extract_links(html: &str) -> Vec<ContentLink> {
    static RE_ANCHOR: OnceCell<Regex> = OnceCell::new();
    let re = RE_ANCHOR.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>(.*?)</a>"#).unwrap()
    });

    let links: Vec<ContentLink> = re
        .captures_iter(html)
        .filter_map(|c| {
            let quoted = c.get(1).or_else(|| c.get(2))?;
            let href = html_escape::decode_html_entities(quoted.as_str()).to_string();
            if href.trim().is_empty() {
                return None;
            }
            let text = normalize_text(c.get(3).map_or("", |m| m.as_str()));
            Some(ContentLink {
                href: qualify_link(&href),
                text: if text.is_empty() {
                    NO_LINK_TEXT.to_string()
                } else {
                    text
                },
            })
        })
        .collect();

    tracing::trace!(target: "source", count = links.len(), "links extracted");
    links
}
