// src/config.rs
//! Run configuration, read once at startup.
//!
//! Lookup order for the file: `$DIGEST_CONFIG_PATH`, then
//! `config/digest.toml`, then `config/digest.json`, then built-in defaults.
//! A handful of env vars override single keys afterwards. Mail credentials
//! only come from the environment.

use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
const FALLBACK_JSON_PATH: &str = "config/digest.json";

pub const DEFAULT_TARGET_URL: &str = "https://m.weibo.cn/u/1812511224?jumpfrom=weibocom";
pub const DEFAULT_WINDOW_SECS: u64 = 5 * 3600;
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_LOG_DIR: &str = "weibo_crawl_logs";
/// Asia/Shanghai, the frame the feed renders its times in.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

const ENV_TARGET_URL: &str = "TARGET_URL";
const ENV_WINDOW_SECS: &str = "FRESHNESS_WINDOW_SECS";
const ENV_INTERVAL_SECS: &str = "CRAWL_INTERVAL_SECS";
const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
const ENV_SMTP_HOST: &str = "SMTP_HOST";
const ENV_LOG_DIR: &str = "LOG_DIR";

pub const ENV_SEND_EMAIL: &str = "SEND_EMAIL";
pub const ENV_SEND_PASSWORD: &str = "SEND_PASSWORD";
pub const ENV_RECEIVE_EMAIL: &str = "RECEIVE_EMAIL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Profile page whose posts are collected.
    pub target_url: String,
    /// Freshness window; posts older than `crawl - window` are dropped.
    pub window_secs: u64,
    /// Pause between scheduled runs (`--watch`).
    pub interval_secs: u64,
    /// Fixed UTC offset used for the crawl instant and API timestamps.
    pub utc_offset_secs: i32,
    pub output_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub smtp_host: String,
    pub starttls_port: u16,
    pub ssl_port: u16,
    /// Rotating debug log files land here.
    pub log_dir: PathBuf,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            window_secs: DEFAULT_WINDOW_SECS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            output_dir: PathBuf::from("."),
            request_timeout_secs: 30,
            smtp_host: "smtp.qq.com".to_string(),
            starttls_port: 587,
            ssl_port: 465,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl DigestConfig {
    /// Load from an explicit path (TOML or JSON by extension), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $DIGEST_CONFIG_PATH
    /// 2) config/digest.toml
    /// 3) config/digest.json
    /// 4) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        for p in [DEFAULT_CONFIG_PATH, FALLBACK_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_nonempty(ENV_TARGET_URL) {
            self.target_url = v;
        }
        if let Some(v) = env_number(ENV_WINDOW_SECS) {
            self.window_secs = v;
        }
        if let Some(v) = env_number(ENV_INTERVAL_SECS) {
            self.interval_secs = v;
        }
        if let Some(v) = env_nonempty(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env_nonempty(ENV_SMTP_HOST) {
            self.smtp_host = v;
        }
        if let Some(v) = env_nonempty(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_url.trim().is_empty() {
            bail!("target_url is empty");
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be positive");
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn window(&self) -> chrono::Duration {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_secs)
            .ok_or_else(|| anyhow!("utc_offset_secs out of range: {}", self.utc_offset_secs))
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DigestConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("config json");
    }
    toml::from_str(s).context("config toml")
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_number(key: &str) -> Option<u64> {
    let raw = env_nonempty(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric env override");
            None
        }
    }
}

/// Sender/recipient for the digest mail. Only the email notifier reads these.
#[derive(Clone, PartialEq, Eq)]
pub struct MailCredentials {
    pub sender: String,
    pub password: String,
    pub recipient: String,
}

impl MailCredentials {
    /// Every variable must be set; the error names all that are missing.
    pub fn from_env() -> Result<Self> {
        let get = |k: &str| env_nonempty(k);
        let (sender, password, recipient) = (
            get(ENV_SEND_EMAIL),
            get(ENV_SEND_PASSWORD),
            get(ENV_RECEIVE_EMAIL),
        );

        match (sender, password, recipient) {
            (Some(sender), Some(password), Some(recipient)) => Ok(Self {
                sender,
                password,
                recipient,
            }),
            (s, p, r) => {
                let missing: Vec<&str> = [
                    (ENV_SEND_EMAIL, s.is_none()),
                    (ENV_SEND_PASSWORD, p.is_none()),
                    (ENV_RECEIVE_EMAIL, r.is_none()),
                ]
                .into_iter()
                .filter_map(|(k, miss)| miss.then_some(k))
                .collect();
                Err(anyhow!("missing mail credentials: {}", missing.join(", ")))
            }
        }
    }
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("sender", &self.sender)
            .field("password", &"***")
            .field("recipient", &self.recipient)
            .finish()
    }
}
