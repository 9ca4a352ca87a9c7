/**
 * Upload Routes
 * Admin image upload; files are served back from /uploads
 */
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes::auth::AdminSession;
use crate::state::AppState;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Absolute URL, ready to paste into a post body or `imageUrls`.
    pub url: String,
    pub path: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

/// POST /api/admin/uploads - multipart, first file field wins
pub async fn upload_image(
    _admin: AdminSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let invalid_multipart = |e: axum::extract::multipart::MultipartError| {
        tracing::warn!("Multipart error: {}", e);
        AppError::Validation("Invalid multipart data".to_string())
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let allowed = file_extension(&original_name)
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(AppError::Validation(
                "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.".to_string(),
            ));
        }

        upload = Some(field.bytes().await.map_err(invalid_multipart)?);
        break;
    }
    let bytes = upload.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::Validation("Empty file".to_string()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(AppError::Validation(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }

    let mime_type = validate_image_magic_bytes(&bytes).ok_or_else(|| {
        AppError::Validation("File content does not match an allowed image type.".to_string())
    })?;

    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {e}")))?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for_mime(mime_type));
    tokio::fs::write(upload_dir.join(&filename), &bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save upload: {e}")))?;

    let path = format!("/uploads/{filename}");
    tracing::info!("Image uploaded: {} ({} bytes)", filename, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("{}{}", state.config.public_url, path),
            path,
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    ))
}
