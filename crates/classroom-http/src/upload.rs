//! Lesson file uploads.
//!
//! `POST /api/upload` takes a multipart form with four fields:
//!
//! | Field      | Meaning                                 |
//! |------------|-----------------------------------------|
//! | `file`     | the uploaded bytes, with a file name    |
//! | `lessonId` | lesson the content belongs to           |
//! | `type`     | `pdf`, `audio`, `text` or `video`       |
//! | `title`    | display title                           |
//!
//! The bytes are written to `<uploads_dir>/<uuid>-<name>` and a Content
//! record pointing at `/uploads/<uuid>-<name>` is created.

use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
};
use classroom_core::content::{Collection, ContentType};
use classroom_core::event_bus::WriteAction;
use classroom_core::ClassroomContext;
use serde_json::json;
use uuid::Uuid;

use crate::routes::{announce, fail, ok, store_error, ApiResult};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    lesson_id: Option<String>,
    content_type: Option<String>,
    title: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiResult> {
        let mut form = UploadForm::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => return Err(fail(StatusCode::BAD_REQUEST, e.body_text())),
            };

            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| fail(StatusCode::BAD_REQUEST, e.body_text()))?;
                    form.file = Some((file_name, bytes));
                }
                "lessonId" | "type" | "title" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| fail(StatusCode::BAD_REQUEST, e.body_text()))?;
                    let slot = match name.as_str() {
                        "lessonId" => &mut form.lesson_id,
                        "type" => &mut form.content_type,
                        _ => &mut form.title,
                    };
                    *slot = Some(text);
                }
                other => log::debug!("Ignoring unexpected upload field: {other}"),
            }
        }

        Ok(form)
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiResult> {
    value.ok_or_else(|| {
        fail(
            StatusCode::BAD_REQUEST,
            format!("Missing required field: {field}"),
        )
    })
}

/// Reduce a client-supplied name to a safe single file name.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Handler for POST /api/upload
pub async fn upload_handler(
    State(ctx): State<ClassroomContext>,
    multipart: Multipart,
) -> ApiResult {
    match handle_upload(&ctx, multipart).await {
        Ok(response) | Err(response) => response,
    }
}

async fn handle_upload(ctx: &ClassroomContext, multipart: Multipart) -> Result<ApiResult, ApiResult> {
    let form = UploadForm::read(multipart).await?;

    let (file_name, bytes) = required(form.file, "file")?;
    let lesson_id = required(form.lesson_id, "lessonId")?;
    let content_type = required(form.content_type, "type")?;
    let title = required(form.title, "title")?;

    let content_type: ContentType = content_type.parse().map_err(store_error)?;

    let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&file_name));
    let uploads_dir = ctx.uploads_dir();
    let path = uploads_dir.join(&stored_name);

    if let Err(e) = tokio::fs::create_dir_all(uploads_dir).await {
        log::error!("Failed to create uploads dir {}: {e}", uploads_dir.display());
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        log::error!("Failed to write upload {}: {e}", path.display());
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    let body = json!({
        "title": title,
        "type": content_type,
        "lessonId": lesson_id,
        "fileUrl": format!("/uploads/{stored_name}"),
        "fileName": file_name,
    });

    match ctx.store.insert(Collection::Contents, body) {
        Ok(doc) => {
            log::info!("Stored upload {} ({} bytes)", stored_name, bytes.len());
            announce(ctx, Collection::Contents, &doc, WriteAction::Created);
            Ok(ok(StatusCode::CREATED, doc))
        }
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                log::warn!("Failed to remove orphaned upload {}: {remove_err}", path.display());
            }
            Err(store_error(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name("worksheet-1.pdf"), "worksheet-1.pdf");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("/tmp/song.mp3"), "song.mp3");
    }

    #[test]
    fn sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_file_name("my notes (final).pdf"), "my_notes__final_.pdf");
    }

    #[test]
    fn sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[test]
    fn required_reports_field_name() {
        let (status, axum::Json(body)) = required::<String>(None, "lessonId").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.as_deref(), Some("Missing required field: lessonId"));
    }
}
