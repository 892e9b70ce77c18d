// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use chrono::NaiveDateTime;

/// What the operator gets told about one run with accepted posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub crawl_instant: NaiveDateTime,
    pub window_secs: u64,
    pub accepted_count: usize,
    pub artifact_name: String,
    pub artifact: String,
}

impl DigestReport {
    pub fn subject(&self) -> String {
        format!(
            "微博爬虫-{}-{}内新内容（共{}条）",
            self.crawl_instant.format("%Y-%m-%d"),
            window_label(self.window_secs),
            self.accepted_count
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            "<h3>微博爬虫通知</h3>\n\
             <p>本次爬取时间：{}</p>\n\
             <p>筛选范围：{}内发布的微博</p>\n\
             <p>爬取到有效内容数量：{}条</p>\n\
             <p>附件为爬取结果的JSON文件，请查收。</p>\n",
            self.crawl_instant.format("%Y-%m-%d %H:%M:%S"),
            window_label(self.window_secs),
            self.accepted_count
        )
    }
}

/// "5小时" for whole hours, "90分钟" for whole minutes, "45秒" otherwise.
pub fn window_label(secs: u64) -> String {
    if secs > 0 && secs % 3600 == 0 {
        format!("{}小时", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}分钟", secs / 60)
    } else {
        format!("{secs}秒")
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_digest(&self, report: &DigestReport) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Logs instead of mailing. Used by `--dry-run`.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send_digest(&self, report: &DigestReport) -> Result<()> {
        tracing::info!(
            target: "notify",
            subject = %report.subject(),
            attachment = %report.artifact_name,
            bytes = report.artifact.len(),
            "dry run, mail not sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn report() -> DigestReport {
        DigestReport {
            crawl_instant: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            window_secs: 5 * 3600,
            accepted_count: 2,
            artifact_name: "weibo_data_20240101_120000.json".into(),
            artifact: "[]".into(),
        }
    }

    #[test]
    fn subject_names_date_window_and_count() {
        assert_eq!(report().subject(), "微博爬虫-2024-01-01-5小时内新内容（共2条）");
    }

    #[test]
    fn body_mentions_crawl_time_and_count() {
        let body = report().html_body();
        assert!(body.contains("2024-01-01 12:00:00"));
        assert!(body.contains("5小时内发布的微博"));
        assert!(body.contains("2条"));
    }

    #[test]
    fn window_labels() {
        assert_eq!(window_label(7200), "2小时");
        assert_eq!(window_label(5400), "90分钟");
        assert_eq!(window_label(0), "0分钟");
        assert_eq!(window_label(45), "45秒");
    }
}
