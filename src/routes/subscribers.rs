/**
 * Subscriber Routes
 * Public subscription plus admin listing and removal
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Subscriber;
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::routes::auth::AdminSession;
use crate::routes::AppJson;
use crate::state::AppState;

const MAX_EMAIL_CHARS: usize = 254;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriberListResponse {
    pub items: Vec<Subscriber>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Trim and lower-case; `None` unless the result looks like `local@domain`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.chars().count() > MAX_EMAIL_CHARS {
        return None;
    }
    if email.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

/// POST /api/subscribe
/// Subscribing an address twice is a silent success; only the first sends a welcome email.
pub async fn subscribe(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SubscribeRequest>,
) -> AppResult<Json<SubscribeResponse>> {
    let email = normalize_email(&payload.email)
        .ok_or_else(|| AppError::Validation("A valid email address is required".to_string()))?;

    let created = state.store.add_subscriber(&email).await?;
    if created {
        tracing::info!(email = %email, "New subscriber");
        state
            .mailer
            .spawn_one("welcome", email, templates::welcome(&state.config.site));
    } else {
        tracing::debug!(email = %email, "Already subscribed");
    }

    Ok(Json(SubscribeResponse {
        success: true,
        message: "Thanks for subscribing!".to_string(),
    }))
}

/// GET /api/admin/subscribers
pub async fn list_subscribers(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<SubscriberListResponse>> {
    let items = state.store.list_subscribers().await?;
    Ok(Json(SubscriberListResponse {
        total: items.len(),
        items,
    }))
}

/// DELETE /api/admin/subscribers/{id}
pub async fn delete_subscriber(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    if !state.store.delete_subscriber(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(subscriber_id = %id, "Subscriber removed");
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::TestApp;
    use axum::http::StatusCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("  Reader@Example.COM ", Some("reader@example.com"))]
    #[case("a@b", Some("a@b"))]
    #[case("", None)]
    #[case("no-at-sign", None)]
    #[case("@example.com", None)]
    #[case("reader@", None)]
    #[case("a@b@c", None)]
    #[case("a b@example.com", None)]
    fn test_normalize_email(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_email(raw).as_deref(), expected);
    }

    async fn wait_for_sends(app: &TestApp, n: usize) {
        for _ in 0..50 {
            if app.provider.recipients().len() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_one_record() {
        let app = TestApp::new().await;

        for email in ["Reader@Example.com", " reader@example.com "] {
            let (status, body) = app
                .send_json("POST", "/api/subscribe", json!({ "email": email }), false)
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
        }

        let subscribers = app.state.store.list_subscribers().await.unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].email, "reader@example.com");

        wait_for_sends(&app, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(app.provider.recipients(), ["reader@example.com"]);
    }

    #[tokio::test]
    async fn test_subscribe_invalid_email_is_bad_request() {
        let app = TestApp::new().await;
        let (status, _) = app
            .send_json("POST", "/api/subscribe", json!({ "email": "nope" }), false)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscribe_without_email_field_is_json_bad_request() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send_json("POST", "/api/subscribe", json!({}), false)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("email"));
        assert!(app.state.store.list_subscribers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_lists_and_deletes_subscribers() {
        let app = TestApp::new().await;
        app.state.store.add_subscriber("a@example.com").await.unwrap();

        let (status, body) = app.admin_get("/api/admin/subscribers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        let id = body["items"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = app.admin_delete(&format!("/api/admin/subscribers/{id}")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.admin_delete(&format!("/api/admin/subscribers/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subscriber_routes_require_auth() {
        let app = TestApp::new().await;
        let (status, _) = app.get("/api/admin/subscribers").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
