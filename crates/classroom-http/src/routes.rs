//! REST handlers for the content hierarchy.
//!
//! Every collection gets the same five routes:
//!
//! ```text
//! GET    /api/{collection}        list (?parentId= or ?<parentField>= filters)
//! POST   /api/{collection}        create
//! GET    /api/{collection}/{id}   fetch
//! PUT    /api/{collection}/{id}   partial update
//! DELETE /api/{collection}/{id}   delete
//! ```
//!
//! Responses share one envelope: `{ success, data?, error? }`.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use classroom_core::content::{Collection, Document, StoreError};
use classroom_core::event_bus::{ChangeEvent, WriteAction};
use classroom_core::ClassroomContext;
use serde::Serialize;
use serde_json::Value;

/// Response envelope for every API route.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The result data (if successful).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type ApiResult = (StatusCode, Json<ApiResponse>);

pub(crate) fn ok(status: StatusCode, data: impl Serialize) -> ApiResult {
    match serde_json::to_value(data) {
        Ok(data) => (
            status,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        ),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub(crate) fn fail(status: StatusCode, error: impl Into<String>) -> ApiResult {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(error.into()),
        }),
    )
}

pub(crate) fn store_error(e: StoreError) -> ApiResult {
    let status = match &e {
        StoreError::NotFound { .. } | StoreError::UnknownCollection(_) => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Io(_) | StoreError::Json(_) | StoreError::InvalidConnectionString(_) => {
            log::error!("Store failure: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    fail(status, e.to_string())
}

fn bad_json(rejection: JsonRejection) -> ApiResult {
    fail(StatusCode::BAD_REQUEST, rejection.body_text())
}

fn parse_collection(name: &str) -> Result<Collection, ApiResult> {
    name.parse().map_err(store_error)
}

pub(crate) fn announce(
    ctx: &ClassroomContext,
    collection: Collection,
    doc: &Document,
    action: WriteAction,
) {
    if let Some(id) = doc.get("id").and_then(Value::as_str) {
        ctx.event_bus
            .emit(ChangeEvent::content(collection, id, action));
    }
}

/// Handler for GET /api/health
pub async fn health() -> ApiResult {
    ok(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

/// Handler for GET /api/{collection}
pub async fn list_records(
    State(ctx): State<ClassroomContext>,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(response) => return response,
    };

    let parent_id = query.get("parentId").or_else(|| {
        collection
            .parent_field()
            .and_then(|field| query.get(field))
    });

    let docs = ctx.store.list(collection, parent_id.map(String::as_str));
    ok(StatusCode::OK, docs)
}

/// Handler for POST /api/{collection}
pub async fn create_record(
    State(ctx): State<ClassroomContext>,
    Path(collection): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };

    match ctx.store.insert(collection, body) {
        Ok(doc) => {
            log::debug!("Created {collection} record");
            announce(&ctx, collection, &doc, WriteAction::Created);
            ok(StatusCode::CREATED, doc)
        }
        Err(e) => store_error(e),
    }
}

/// Handler for GET /api/{collection}/{id}
pub async fn get_record(
    State(ctx): State<ClassroomContext>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(response) => return response,
    };

    match ctx.store.get(collection, &id) {
        Ok(doc) => ok(StatusCode::OK, doc),
        Err(e) => store_error(e),
    }
}

/// Handler for PUT /api/{collection}/{id}
pub async fn update_record(
    State(ctx): State<ClassroomContext>,
    Path((collection, id)): Path<(String, String)>,
    patch: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let Json(patch) = match patch {
        Ok(patch) => patch,
        Err(rejection) => return bad_json(rejection),
    };

    match ctx.store.update(collection, &id, patch) {
        Ok(doc) => {
            announce(&ctx, collection, &doc, WriteAction::Updated);
            ok(StatusCode::OK, doc)
        }
        Err(e) => store_error(e),
    }
}

/// Handler for DELETE /api/{collection}/{id}
pub async fn delete_record(
    State(ctx): State<ClassroomContext>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(response) => return response,
    };

    match ctx.store.delete(collection, &id) {
        Ok(doc) => {
            log::debug!("Deleted {collection} record {id}");
            announce(&ctx, collection, &doc, WriteAction::Deleted);
            ok(StatusCode::OK, doc)
        }
        Err(e) => store_error(e),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_omits_error() {
        let (status, Json(body)) = ok(StatusCode::OK, vec![1, 2]);
        assert_eq!(status, StatusCode::OK);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn fail_envelope_omits_data() {
        let (status, Json(body)) = fail(StatusCode::BAD_REQUEST, "nope");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (
                StoreError::NotFound {
                    collection: Collection::Lessons,
                    id: "x".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::UnknownCollection("courses".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::Invalid("missing field".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = store_error(error);
            assert_eq!(status, expected);
        }
    }
}
