//! Transactional mail delivery.
//!
//! Sends go through the [`Mailer`] trait so handlers never block on SMTP;
//! [`send_detached`] spawns the delivery with one retry and logs the
//! outcome. Without SMTP configured a logging no-op transport is used.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP mailer over lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: lettre::message::Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .context("Failed to build SMTP transport")?
            .port(config.port)
            .credentials(credentials)
            .build();
        let from = config
            .from
            .parse()
            .with_context(|| format!("Invalid from address: {}", config.from))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().with_context(|| format!("Invalid recipient: {}", to))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("Failed to build message")?;
        self.transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }
}

/// Used when SMTP is not configured; logs instead of delivering.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::warn!("SMTP not configured, dropping mail to {} ({})", to, subject);
        Ok(())
    }
}

/// Fire-and-forget delivery: the request never waits on mail. One retry
/// after a short backoff; both failures are logged for monitoring.
pub fn send_detached(mailer: Arc<dyn Mailer>, to: String, subject: String, body: String) {
    tokio::spawn(async move {
        match mailer.send(&to, &subject, &body).await {
            Ok(()) => {
                tracing::debug!("Sent mail to {} ({})", to, subject);
                return;
            }
            Err(e) => {
                tracing::warn!("Mail to {} failed, retrying: {:#}", to, e);
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        if let Err(e) = mailer.send(&to, &subject, &body).await {
            tracing::error!("Mail to {} failed after retry: {:#}", to, e);
        }
    });
}

#[cfg(test)]
pub mod test_mailer {
    use super::*;
    use std::sync::Mutex;

    /// Records sends for assertions; can be told to fail.
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub fail_times: Mutex<u32>,
    }

    impl RecordingMailer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_times: Mutex::new(0),
            })
        }

        pub fn failing(times: u32) -> Arc<Self> {
            let mailer = Self::new();
            *mailer.fail_times.lock().unwrap() = times;
            mailer
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            {
                let mut remaining = self.fail_times.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    anyhow::bail!("simulated delivery failure");
                }
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_mailer::RecordingMailer;
    use super::*;

    #[tokio::test]
    async fn test_recording_mailer_captures_send() {
        let mailer = RecordingMailer::new();
        mailer
            .send("anna@example.com", "Your code", "123456")
            .await
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "anna@example.com");
        assert_eq!(sent[0].2, "123456");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_detached_retries_once() {
        let mailer = RecordingMailer::failing(1);
        send_detached(
            mailer.clone() as Arc<dyn Mailer>,
            "anna@example.com".into(),
            "subject".into(),
            "body".into(),
        );

        // First attempt fails, retry after the backoff succeeds
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_detached_gives_up_after_retry() {
        let mailer = RecordingMailer::failing(2);
        send_detached(
            mailer.clone() as Arc<dyn Mailer>,
            "anna@example.com".into(),
            "subject".into(),
            "body".into(),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_noop_mailer_is_infallible() {
        assert!(NoopMailer.send("x@example.com", "s", "b").await.is_ok());
    }
}
