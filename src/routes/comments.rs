/**
 * Comment Routes
 * Public comment submission
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::render::is_valid_slug;
use crate::routes::AppJson;
use crate::state::AppState;

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
const MAX_AUTHOR_CHARS: usize = 100;
const MAX_COMMENT_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[serde(default)]
    pub author_name: Option<String>,
    pub body: String,
}

/// POST /api/posts/{slug}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Comment body is required".to_string()));
    }
    if body.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(format!(
            "Comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }

    let author = payload
        .author_name
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(ANONYMOUS_AUTHOR);
    if author.chars().count() > MAX_AUTHOR_CHARS {
        return Err(AppError::Validation("Name is too long".to_string()));
    }

    if !is_valid_slug(&slug) {
        return Err(AppError::NotFound);
    }
    let post = state
        .store
        .find_post_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let comment = state.store.add_comment(post.id, author, body).await?;
    tracing::info!(slug = %slug, comment_id = %comment.id, "Comment added");

    Ok((StatusCode::CREATED, Json(comment)))
}
