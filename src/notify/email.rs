// src/notify/email.rs
use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{DigestReport, Notifier};
use crate::config::{DigestConfig, MailCredentials};

/// Mails the digest with the artifact attached.
///
/// Tries STARTTLS on `starttls_port` first; on any failure retries once over
/// implicit TLS on `ssl_port`.
pub struct EmailNotifier {
    host: String,
    starttls_port: u16,
    ssl_port: u16,
    creds: Credentials,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(cfg: &DigestConfig, mail: &MailCredentials) -> Result<Self> {
        let from = mail
            .sender
            .parse::<Mailbox>()
            .with_context(|| format!("invalid sender address {}", mail.sender))?;
        let to = mail
            .recipient
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient address {}", mail.recipient))?;
        Ok(Self {
            host: cfg.smtp_host.clone(),
            starttls_port: cfg.starttls_port,
            ssl_port: cfg.ssl_port,
            creds: Credentials::new(mail.sender.clone(), mail.password.clone()),
            from,
            to,
        })
    }

    pub fn build_message(&self, report: &DigestReport) -> Result<Message> {
        let json = ContentType::parse("application/json").context("attachment content type")?;
        let attachment = Attachment::new(report.artifact_name.clone())
            .body(report.artifact.clone().into_bytes(), json);

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(report.subject())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(report.html_body()))
                    .singlepart(attachment),
            )
            .context("build email")
    }

    async fn send_starttls(&self, msg: Message) -> Result<()> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .with_context(|| format!("invalid smtp host {}", self.host))?
            .port(self.starttls_port)
            .credentials(self.creds.clone())
            .build();
        mailer.send(msg).await.context("send via starttls")?;
        Ok(())
    }

    async fn send_implicit_tls(&self, msg: Message) -> Result<()> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .with_context(|| format!("invalid smtp host {}", self.host))?
            .port(self.ssl_port)
            .credentials(self.creds.clone())
            .build();
        mailer.send(msg).await.context("send via implicit tls")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send_digest(&self, report: &DigestReport) -> Result<()> {
        let msg = self.build_message(report)?;

        match self.send_starttls(msg.clone()).await {
            Ok(()) => {
                tracing::info!(
                    target: "notify",
                    port = self.starttls_port,
                    attachment = %report.artifact_name,
                    to = %self.to,
                    "digest mailed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    target: "notify",
                    port = self.starttls_port,
                    fallback_port = self.ssl_port,
                    error = %format!("{e:#}"),
                    "starttls send failed, retrying over implicit tls"
                );
                self.send_implicit_tls(msg).await?;
                tracing::info!(
                    target: "notify",
                    port = self.ssl_port,
                    attachment = %report.artifact_name,
                    to = %self.to,
                    "digest mailed"
                );
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn creds() -> MailCredentials {
        MailCredentials {
            sender: "bot@example.com".into(),
            password: "pw".into(),
            recipient: "ops@example.com".into(),
        }
    }

    fn report() -> DigestReport {
        DigestReport {
            crawl_instant: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            window_secs: 18_000,
            accepted_count: 1,
            artifact_name: "weibo_data_20240101_120000.json".into(),
            artifact: "[]".into(),
        }
    }

    #[test]
    fn message_carries_json_attachment() {
        let notifier = EmailNotifier::new(&DigestConfig::default(), &creds()).unwrap();
        let raw = String::from_utf8(notifier.build_message(&report()).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/json"));
        assert!(raw.contains("weibo_data_20240101_120000.json"));
        assert!(raw.contains("ops@example.com"));
    }

    #[test]
    fn bad_address_is_rejected() {
        let creds = MailCredentials {
            sender: "not an address".into(),
            password: "pw".into(),
            recipient: "ops@example.com".into(),
        };
        assert!(EmailNotifier::new(&DigestConfig::default(), &creds).is_err());
    }

    #[tokio::test]
    async fn falls_back_to_implicit_tls_port() {
        // Nothing listens on either port, so both attempts are refused and the
        // surfaced error must come from the second (implicit tls) attempt.
        let cfg = DigestConfig {
            smtp_host: "127.0.0.1".into(),
            starttls_port: 1,
            ssl_port: 2,
            ..DigestConfig::default()
        };
        let notifier = EmailNotifier::new(&cfg, &creds()).unwrap();
        let err = tokio::time::timeout(std::time::Duration::from_secs(30), notifier.send_digest(&report()))
            .await
            .expect("both connects should be refused promptly")
            .unwrap_err();
        assert!(format!("{err:#}").contains("send via implicit tls"), "{err:#}");
    }
}
