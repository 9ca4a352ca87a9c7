/**
 * Routes Module
 * API route handlers
 */
use axum::extract::{FromRequest, OptionalFromRequest, Request};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::AppError;

pub mod admin;
pub mod auth;
pub mod blog;
pub mod comments;
pub mod health;
pub mod rss;
pub mod subscribers;
pub mod upload;

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// JSON request body whose rejection is an [`AppError::Validation`], so a
/// malformed or incomplete body gets the same 400 `ErrorResponse` as any
/// other invalid input.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = <axum::Json<T> as FromRequest<S>>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Absent body (no JSON content type) is `None`; a present but invalid body is still a 400.
impl<S, T> OptionalFromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let value =
            <axum::Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(value.map(|axum::Json(v)| Self(v)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router-level helpers shared by the handler tests.

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::db::Store;
    use crate::mail::{testing::RecordingProvider, EmailProvider, Mailer};
    use crate::state::AppState;

    pub struct TestApp {
        pub state: AppState,
        pub provider: Arc<RecordingProvider>,
        pub token: String,
    }

    impl TestApp {
        pub async fn new() -> Self {
            Self::with_provider(RecordingProvider::default()).await
        }

        pub async fn with_provider(provider: RecordingProvider) -> Self {
            let config = AppConfig::for_tests();
            let store = Store::in_memory().await.unwrap();
            store.bootstrap_admin(&config.auth).await.unwrap();

            let provider = Arc::new(provider);
            let providers: Vec<Arc<dyn EmailProvider>> = vec![provider.clone()];
            let mailer = Mailer::new("blog@example.com", providers);

            let admin = store
                .find_admin_by_email(&config.auth.admin_email)
                .await
                .unwrap()
                .unwrap();
            let token =
                super::auth::create_access_token(&config.auth, &admin.id.to_string(), &admin.email)
                    .unwrap();

            Self {
                state: AppState::new(store, mailer, config),
                provider,
                token,
            }
        }

        pub fn router(&self) -> Router {
            crate::create_app(self.state.clone())
        }

        pub async fn request(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
            let res = self.router().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (status, value)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.request(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        pub async fn admin_get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            let req = Request::get(uri)
                .header("authorization", format!("Bearer {}", self.token))
                .body(Body::empty())
                .unwrap();
            self.request(req).await
        }

        pub async fn send_json(
            &self,
            method: &str,
            uri: &str,
            json: serde_json::Value,
            authed: bool,
        ) -> (StatusCode, serde_json::Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if authed {
                builder = builder.header("authorization", format!("Bearer {}", self.token));
            }
            let req = builder
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap();
            self.request(req).await
        }

        pub async fn admin_delete(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            let req = Request::delete(uri)
                .header("authorization", format!("Bearer {}", self.token))
                .body(Body::empty())
                .unwrap();
            self.request(req).await
        }

        /// Create a post through the admin API and return its slug.
        pub async fn create_post(&self, title: &str, body: &str) -> String {
            let (status, json) = self
                .send_json(
                    "POST",
                    "/api/admin/posts",
                    serde_json::json!({ "title": title, "body": body }),
                    true,
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
            json["post"]["slug"].as_str().unwrap().to_string()
        }
    }
}
