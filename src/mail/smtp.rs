//! SMTP relay provider, used when the HTTPS API is absent or fails.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

use super::{EmailMessage, EmailProvider, MailError};

/// Connection and command timeout for the relay.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// SMTPS port; TLS starts with the connection instead of via STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    /// Authenticated relay. Port 465 uses implicit TLS, any other port STARTTLS.
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Result<Self, MailError> {
        let builder = if uses_implicit_tls(port) {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let transport = builder
            .port(port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport })
    }
}

fn uses_implicit_tls(port: u16) -> bool {
    port == IMPLICIT_TLS_PORT
}

/// Plain-text and HTML alternatives in one MIME message.
pub(crate) fn build_message(message: &EmailMessage) -> Result<Message, MailError> {
    Message::builder()
        .from(message.from.parse()?)
        .to(message.to.parse()?)
        .subject(&message.subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(message.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(message.html.clone()),
                ),
        )
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;
        self.transport.send(email).await?;
        Ok(())
    }
}
