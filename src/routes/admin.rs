/**
 * Admin Routes
 * Dashboard, broadcast, test send and full-site wipe
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, Subscriber, WipeSummary};
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::routes::auth::AdminSession;
use crate::routes::AppJson;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub posts: Vec<Post>,
    pub subscribers: Vec<Subscriber>,
    pub email_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub recipients: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestEmailRequest {
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub success: bool,
    pub to: String,
    pub provider: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WipeResponse {
    pub success: bool,
    pub removed: WipeSummary,
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<DashboardResponse>> {
    let posts = state.store.list_posts().await?;
    let subscribers = state.store.list_subscribers().await?;

    Ok(Json(DashboardResponse {
        posts,
        subscribers,
        email_configured: state.mailer.is_configured(),
    }))
}

/// POST /api/admin/broadcast
/// Responds as soon as the batch is queued; per-recipient outcomes are logged.
pub async fn broadcast(
    admin: AdminSession,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BroadcastRequest>,
) -> AppResult<impl IntoResponse> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::Validation("Subject is required".to_string()));
    }
    if payload.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let recipients = state.store.subscriber_emails().await?;
    let count = recipients.len();

    tracing::info!(admin = %admin.email, recipients = count, "Broadcast queued");
    state.mailer.spawn_batch(
        "broadcast",
        recipients,
        templates::broadcast(subject, &payload.message),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastResponse {
            success: true,
            recipients: count,
        }),
    ))
}

/// POST /api/admin/test-email
/// Sends synchronously so the admin sees whether delivery works.
pub async fn test_email(
    admin: AdminSession,
    State(state): State<AppState>,
    payload: Option<AppJson<TestEmailRequest>>,
) -> AppResult<Json<TestEmailResponse>> {
    let to = payload
        .and_then(|AppJson(p)| p.to)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or(admin.email);

    let provider = state
        .mailer
        .deliver(&to, &templates::test_message(&state.config.site))
        .await?;

    tracing::info!(to = %to, provider, "Test email sent");
    Ok(Json(TestEmailResponse {
        success: true,
        to,
        provider,
    }))
}

/// DELETE /api/admin/site
/// Removes every post, comment and subscriber. Admin accounts are kept.
pub async fn wipe_site(
    admin: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<WipeResponse>> {
    let removed = state.store.wipe_site().await?;
    tracing::warn!(
        admin = %admin.email,
        posts = removed.posts,
        comments = removed.comments,
        subscribers = removed.subscribers,
        "Site wiped"
    );
    Ok(Json(WipeResponse {
        success: true,
        removed,
    }))
}
