//! Transactional-email HTTPS API provider.
//!
//! Posts `{from, to, subject, html, text}` as JSON with a bearer API key.
//! Any non-2xx status or transport error counts as a failed send.

use async_trait::async_trait;
use std::time::Duration;

use super::{EmailMessage, EmailProvider, MailError};

/// Bounds a single API call; the batch as a whole has no timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpApiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpApiProvider {
    pub fn new(url: &str, api_key: &str) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl EmailProvider for HttpApiProvider {
    fn name(&self) -> &'static str {
        "http-api"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    fn message() -> EmailMessage {
        EmailMessage {
            from: "blog@example.com".to_string(),
            to: "reader@example.com".to_string(),
            subject: "Subject".to_string(),
            html: "<p>Body</p>".to_string(),
            text: "Body".to_string(),
        }
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/emails")
    }

    #[tokio::test]
    async fn test_send_posts_json_payload_with_bearer_key() {
        let seen: Arc<Mutex<Option<(String, serde_json::Value)>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let router = Router::new().route(
            "/emails",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((auth, body));
                    StatusCode::OK
                }
            }),
        );
        let url = serve(router).await;

        let provider = HttpApiProvider::new(&url, "key-123").unwrap();
        provider.send(&message()).await.unwrap();

        let (auth, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(auth, "Bearer key-123");
        assert_eq!(body["from"], "blog@example.com");
        assert_eq!(body["to"], "reader@example.com");
        assert_eq!(body["subject"], "Subject");
        assert_eq!(body["html"], "<p>Body</p>");
        assert_eq!(body["text"], "Body");
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let router = Router::new().route("/emails", post(|| async { StatusCode::UNPROCESSABLE_ENTITY }));
        let url = serve(router).await;

        let provider = HttpApiProvider::new(&url, "key").unwrap();
        let err = provider.send(&message()).await.unwrap_err();
        assert!(matches!(err, MailError::HttpStatus(422)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = HttpApiProvider::new(&format!("http://{addr}/emails"), "key").unwrap();
        let err = provider.send(&message()).await.unwrap_err();
        assert!(matches!(err, MailError::Request(_)));
    }
}
