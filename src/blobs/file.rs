use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::AppResult;

use super::Bucket;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn file(
    Path((bucket, id)): Path<(Bucket, Uuid)>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Response> {
    let Some((content_type, data)): Option<(Option<String>, Vec<u8>)> =
        sqlx::query_as("SELECT content_type,data FROM blobs WHERE id=? AND bucket=?")
            .bind(id.to_string())
            .bind(bucket.as_str())
            .fetch_optional(&db_pool)
            .await?
    else {
        return Ok((StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response());
    };

    let content_type = content_type.unwrap_or_else(|| bucket.fallback_content_type().to_owned());
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, "inline".to_owned()),
        ],
        data,
    )
        .into_response())
}
