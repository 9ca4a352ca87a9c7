/**
 * Blog Routes
 * Public reads and admin CRUD for posts
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{Comment, NewPost, Post};
use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::render::{excerpt, is_valid_slug, render_body, slugify};
use crate::routes::auth::AdminSession;
use crate::routes::AppJson;
use crate::state::AppState;

const LIST_EXCERPT_CHARS: usize = 200;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for GET /api/posts
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub items: Vec<PostSummary>,
    pub total: usize,
}

/// Post summary (for list view)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response for GET /api/posts/{slug}
#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub html: String,
    pub comments: Vec<Comment>,
}

/// Response for admin create/update
#[derive(Debug, Serialize)]
pub struct PostSavedResponse {
    pub post: Post,
    pub html: String,
    /// Subscribers queued for the new-post email. Absent on edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<usize>,
}

/// Request body for POST /api/admin/posts
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Request body for PATCH /api/admin/posts/{slug}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: bool,
}

// ============================================================================
// Helpers
// ============================================================================

/// Append each non-blank image URL on its own line so the renderer embeds it.
fn append_image_urls(body: &str, image_urls: &[String]) -> String {
    let mut body = body.trim_end().to_string();
    for url in image_urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(url);
    }
    body
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/posts - List posts, newest first
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<PostListResponse>> {
    let posts = state.store.list_posts().await?;

    let items: Vec<PostSummary> = posts
        .into_iter()
        .map(|p| PostSummary {
            excerpt: excerpt(&p.body, LIST_EXCERPT_CHARS),
            id: p.id,
            title: p.title,
            slug: p.slug,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect();

    Ok(Json(PostListResponse {
        total: items.len(),
        items,
    }))
}

/// GET /api/posts/{slug} - One post with rendered body and comments
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PostDetailResponse>> {
    if !is_valid_slug(&slug) {
        return Err(AppError::NotFound);
    }

    let post = state
        .store
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let comments = state.store.list_comments(post.id).await?;

    Ok(Json(PostDetailResponse {
        html: render_body(&post.body),
        post,
        comments,
    }))
}

/// POST /api/admin/posts - Create a post and notify subscribers
pub async fn create_post(
    _admin: AdminSession,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if payload.body.trim().is_empty() && payload.image_urls.iter().all(|u| u.trim().is_empty()) {
        return Err(AppError::Validation("Body is required".to_string()));
    }

    let slug = slugify(title);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Title must contain at least one letter or digit".to_string(),
        ));
    }

    let post = state
        .store
        .create_post(NewPost {
            title: title.to_string(),
            slug,
            body: append_image_urls(&payload.body, &payload.image_urls),
        })
        .await?;

    tracing::info!(slug = %post.slug, "Post created");

    // The post exists at this point; a failed lookup only skips notification.
    let recipients = match state.store.subscriber_emails().await {
        Ok(emails) => emails,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load subscribers for new-post email");
            Vec::new()
        }
    };
    let notified = recipients.len();
    if notified > 0 {
        let content = templates::new_post(&state.config.site, &post);
        state.mailer.spawn_batch("new-post", recipients, content);
    }

    Ok((
        StatusCode::CREATED,
        Json(PostSavedResponse {
            html: render_body(&post.body),
            post,
            notified: Some(notified),
        }),
    ))
}

/// PATCH /api/admin/posts/{slug} - Edit title and/or body
pub async fn update_post(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> AppResult<Json<PostSavedResponse>> {
    if !is_valid_slug(&slug) {
        return Err(AppError::NotFound);
    }

    let existing = state
        .store
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let title = match payload.title.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("Title cannot be empty".to_string())),
        Some(t) => t.to_string(),
        None => existing.title,
    };
    let body = append_image_urls(
        payload.body.as_deref().unwrap_or(&existing.body),
        &payload.image_urls,
    );
    if body.trim().is_empty() {
        return Err(AppError::Validation("Body cannot be empty".to_string()));
    }

    let post = state
        .store
        .update_post(&slug, &title, &body)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(slug = %post.slug, "Post updated");

    Ok(Json(PostSavedResponse {
        html: render_body(&post.body),
        post,
        notified: None,
    }))
}

/// DELETE /api/admin/posts/{slug} - Delete a post and its comments.
/// Deleting a missing post succeeds with `deleted: false`.
pub async fn delete_post(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = state.store.delete_post(&slug).await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}
