/*!
 * Mail Module
 * Best-effort email delivery through an ordered list of providers
 *
 * A message goes to the first provider that accepts it. Batches send every
 * recipient as an independent task and wait for all of them; nothing is
 * retried and failures are only logged and counted.
 */
pub mod http_api;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::MailConfig;

pub use http_api::HttpApiProvider;
pub use smtp::SmtpProvider;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("no email provider is configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("all email providers failed, last error: {0}")]
    AllProvidersFailed(String),
}

/// One email to one recipient, as handed to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Recipient-independent part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Aggregate outcome of a fan-out. `sent + failed` equals the recipient count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct Mailer {
    from: String,
    providers: Vec<Arc<dyn EmailProvider>>,
}

impl Mailer {
    pub fn new(from: impl Into<String>, providers: Vec<Arc<dyn EmailProvider>>) -> Self {
        Self {
            from: from.into(),
            providers,
        }
    }

    /// Build the provider chain from configuration: the HTTPS API first, then SMTP.
    pub fn from_config(config: &MailConfig) -> Self {
        let (from, configured) = config.resolve_from();
        if !configured {
            tracing::warn!(
                from = %from,
                "Neither MAIL_FROM nor SMTP_USER is set; using fallback sender address"
            );
        }

        let mut providers: Vec<Arc<dyn EmailProvider>> = Vec::new();

        if let Some(api_key) = &config.api_key {
            match HttpApiProvider::new(&config.api_url, api_key) {
                Ok(provider) => providers.push(Arc::new(provider)),
                Err(e) => tracing::error!(error = %e, "Failed to build email API client"),
            }
        }

        if let (Some(host), Some(user), Some(password)) =
            (&config.smtp_host, &config.smtp_user, &config.smtp_password)
        {
            match SmtpProvider::new(host, config.smtp_port, user, password) {
                Ok(provider) => providers.push(Arc::new(provider)),
                Err(e) => tracing::error!(error = %e, host = %host, "Failed to build SMTP transport"),
            }
        }

        if providers.is_empty() {
            tracing::warn!("No email provider configured; emails will be recorded as failed");
        } else {
            tracing::info!(
                providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
                "Email delivery configured"
            );
        }

        Self::new(from, providers)
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Send to one recipient, trying providers in order until one succeeds.
    /// Returns the name of the provider that delivered.
    pub async fn deliver(&self, to: &str, content: &MailContent) -> Result<&'static str, MailError> {
        if self.providers.is_empty() {
            return Err(MailError::NotConfigured);
        }

        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: content.subject.clone(),
            html: content.html.clone(),
            text: content.text.clone(),
        };

        let mut last_error = None;
        for provider in &self.providers {
            match provider.send(&message).await {
                Ok(()) => {
                    tracing::debug!(provider = provider.name(), to = %to, "email sent");
                    return Ok(provider.name());
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        to = %to,
                        error = %e,
                        "email provider failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(MailError::AllProvidersFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Send the same content to every recipient concurrently and wait for all
    /// outcomes. One failure never stops the others.
    pub async fn send_batch(self: &Arc<Self>, recipients: Vec<String>, content: MailContent) -> BatchReport {
        let content = Arc::new(content);
        let mut tasks = JoinSet::new();

        for to in recipients {
            let mailer = Arc::clone(self);
            let content = Arc::clone(&content);
            tasks.spawn(async move {
                let result = mailer.deliver(&to, &content).await;
                (to, result)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.sent += 1,
                Ok((to, Err(e))) => {
                    tracing::warn!(to = %to, error = %e, "batch email failed");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch email task aborted");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Fire-and-forget batch. The caller does not wait; counts are logged
    /// once every recipient has settled.
    pub fn spawn_batch(
        self: &Arc<Self>,
        kind: &'static str,
        recipients: Vec<String>,
        content: MailContent,
    ) -> JoinHandle<BatchReport> {
        let mailer = Arc::clone(self);
        let total = recipients.len();
        tokio::spawn(async move {
            let report = mailer.send_batch(recipients, content).await;
            tracing::info!(
                kind,
                total,
                sent = report.sent,
                failed = report.failed,
                "email batch settled"
            );
            report
        })
    }

    /// Fire-and-forget single email; failures are logged only.
    pub fn spawn_one(self: &Arc<Self>, kind: &'static str, to: String, content: MailContent) -> JoinHandle<bool> {
        let mailer = Arc::clone(self);
        tokio::spawn(async move {
            match mailer.deliver(&to, &content).await {
                Ok(provider) => {
                    tracing::info!(kind, to = %to, provider, "email sent");
                    true
                }
                Err(e) => {
                    tracing::warn!(kind, to = %to, error = %e, "email not sent");
                    false
                }
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tokio::sync::Semaphore;

    fn content() -> MailContent {
        MailContent {
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        }
    }

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("reader{i}@example.com")).collect()
    }

    #[tokio::test]
    async fn test_deliver_without_providers_is_not_configured() {
        let mailer = Mailer::new("blog@example.com", vec![]);
        assert!(!mailer.is_configured());
        let err = mailer.deliver("a@example.com", &content()).await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
    }

    #[tokio::test]
    async fn test_deliver_falls_back_to_next_provider() {
        let primary = Arc::new(RecordingProvider::always_failing());
        let fallback = Arc::new(RecordingProvider::default());
        let mailer = Mailer::new("blog@example.com", vec![primary.clone(), fallback.clone()]);

        let provider = mailer.deliver("a@example.com", &content()).await.unwrap();
        assert_eq!(provider, "recording");
        assert!(primary.recipients().is_empty());
        assert_eq!(fallback.recipients(), ["a@example.com"]);

        let sent = fallback.sent.lock().unwrap()[0].clone();
        assert_eq!(sent.from, "blog@example.com");
        assert_eq!(sent.subject, "Hello");
    }

    #[tokio::test]
    async fn test_first_successful_provider_wins() {
        let primary = Arc::new(RecordingProvider::default());
        let fallback = Arc::new(RecordingProvider::default());
        let mailer = Mailer::new("blog@example.com", vec![primary.clone(), fallback.clone()]);

        mailer.deliver("a@example.com", &content()).await.unwrap();
        assert_eq!(primary.recipients().len(), 1);
        assert!(fallback.recipients().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_reports_when_every_provider_fails() {
        let mailer = Mailer::new(
            "blog@example.com",
            vec![
                Arc::new(RecordingProvider::always_failing()),
                Arc::new(RecordingProvider::always_failing()),
            ],
        );
        let err = mailer.deliver("a@example.com", &content()).await.unwrap_err();
        assert!(matches!(err, MailError::AllProvidersFailed(_)));
    }

    #[tokio::test]
    async fn test_batch_counts_partial_failures() {
        let recipients = addresses(5);
        let provider = Arc::new(RecordingProvider::failing_for(&[
            "reader1@example.com",
            "reader3@example.com",
        ]));
        let mailer = Arc::new(Mailer::new("blog@example.com", vec![provider.clone()]));

        let report = mailer.send_batch(recipients, content()).await;
        assert_eq!(report, BatchReport { sent: 3, failed: 2 });
        assert_eq!(
            provider.recipients(),
            ["reader0@example.com", "reader2@example.com", "reader4@example.com"]
        );
    }

    #[tokio::test]
    async fn test_batch_without_providers_counts_all_failed() {
        let mailer = Arc::new(Mailer::new("blog@example.com", vec![]));
        let report = mailer.send_batch(addresses(3), content()).await;
        assert_eq!(report, BatchReport { sent: 0, failed: 3 });
    }

    #[tokio::test]
    async fn test_empty_batch_settles_immediately() {
        let mailer = Arc::new(Mailer::new("blog@example.com", vec![]));
        let report = mailer.spawn_batch("test", vec![], content()).await.unwrap();
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_spawn_batch_returns_before_recipients_settle() {
        let gate = Arc::new(Semaphore::new(0));
        let mailer = Arc::new(Mailer::new(
            "blog@example.com",
            vec![Arc::new(GatedProvider { gate: gate.clone() })],
        ));

        let handle = mailer.spawn_batch("test", addresses(4), content());
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        gate.add_permits(4);
        let report = handle.await.unwrap();
        assert_eq!(report, BatchReport { sent: 4, failed: 0 });
    }

    #[tokio::test]
    async fn test_spawn_one_swallows_failure() {
        let mailer = Arc::new(Mailer::new(
            "blog@example.com",
            vec![Arc::new(RecordingProvider::always_failing())],
        ));
        let delivered = mailer
            .spawn_one("welcome", "a@example.com".to_string(), content())
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_from_config_without_credentials_has_no_providers() {
        let mailer = Mailer::from_config(&MailConfig::default());
        assert!(!mailer.is_configured());
        assert_eq!(mailer.from_address(), crate::config::FALLBACK_FROM_ADDRESS);
    }

    #[tokio::test]
    async fn test_from_config_smtp_needs_all_credentials() {
        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_user: Some("user@example.com".to_string()),
            smtp_port: 587,
            ..MailConfig::default()
        };
        let mailer = Mailer::from_config(&config);
        assert!(!mailer.is_configured());
        assert_eq!(mailer.from_address(), "user@example.com");
    }

    #[tokio::test]
    async fn test_from_config_orders_api_before_smtp() {
        let config = MailConfig {
            api_key: Some("key".to_string()),
            api_url: "https://api.example.com/emails".to_string(),
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            smtp_user: Some("user@example.com".to_string()),
            smtp_password: Some("secret".to_string()),
            from: Some("blog@example.com".to_string()),
        };
        let mailer = Mailer::from_config(&config);
        let names: Vec<_> = mailer.providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["http-api", "smtp"]);
        assert_eq!(mailer.from_address(), "blog@example.com");
    }
}
