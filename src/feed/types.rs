// src/feed/types.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

fn default_count() -> String {
    "0".to_string()
}

/// One anchor found inside a post body, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLink {
    pub href: String,
    pub text: String,
}

/// A post as the extraction layer saw it. Every field is tolerated missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeedItem {
    #[serde(default)]
    pub raw_post_time: Option<String>,
    #[serde(default)]
    pub content: String,
    // counts stay display strings ("1.2万", "100万+")
    #[serde(default = "default_count")]
    pub like_count: String,
    #[serde(default = "default_count")]
    pub comment_count: String,
    #[serde(default = "default_count")]
    pub forward_count: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub content_links: Vec<ContentLink>,
}

impl Default for RawFeedItem {
    fn default() -> Self {
        Self {
            raw_post_time: None,
            content: String::new(),
            like_count: default_count(),
            comment_count: default_count(),
            forward_count: default_count(),
            link: None,
            content_links: Vec::new(),
        }
    }
}

/// A raw item that passed the freshness filter, plus its resolved times.
///
/// Field order and renames define the artifact schema; keep them stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedFeedItem {
    pub raw_post_time: String,
    #[serde(rename = "post_datetime", with = "stamp")]
    pub post_instant: NaiveDateTime,
    pub content: String,
    pub like_count: String,
    pub comment_count: String,
    pub forward_count: String,
    #[serde(rename = "weibo_link", with = "blank_as_none")]
    pub link: Option<String>,
    pub content_links: Vec<ContentLink>,
    #[serde(rename = "crawl_time", with = "stamp")]
    pub crawl_instant: NaiveDateTime,
}

impl NormalizedFeedItem {
    pub fn from_raw(
        raw: RawFeedItem,
        raw_post_time: String,
        post_instant: NaiveDateTime,
        crawl_instant: NaiveDateTime,
    ) -> Self {
        Self {
            raw_post_time,
            post_instant,
            content: raw.content,
            like_count: raw.like_count,
            comment_count: raw.comment_count,
            forward_count: raw.forward_count,
            link: raw.link.filter(|l| !l.is_empty()),
            content_links: raw.content_links,
            crawl_instant,
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` wall-clock timestamps.
pub(crate) mod stamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&dt.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Absent link is written as `""` and read back as `None`.
mod blank_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(v.as_deref().unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Option::<String>::deserialize(d)?;
        Ok(v.filter(|s| !s.is_empty()))
    }
}
