use axum::{
    Json, debug_handler,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, header},
};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AppResult;

use super::Bucket;

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub id: Uuid,
    pub filename: String,
    pub url: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn upload(
    Path(bucket): Path<Bucket>,
    State(db_pool): State<SqlitePool>,
    headers: HeaderMap,

    body: Bytes,
) -> AppResult<Json<Uploaded>> {
    let id = Uuid::now_v7();
    let now = OffsetDateTime::now_utc();
    let millis = (now.unix_timestamp_nanos() / 1_000_000) as i64;
    let filename = bucket.file_name(millis, rand::random_range(0..1_000_000_000));
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    sqlx::query("INSERT INTO blobs (id,bucket,filename,content_type,data,created_at) VALUES (?,?,?,?,?,?)")
        .bind(id.to_string())
        .bind(bucket.as_str())
        .bind(&filename)
        .bind(content_type.as_deref())
        .bind(body.as_ref())
        .bind(millis)
        .execute(&db_pool)
        .await?;

    tracing::info!(bucket = bucket.as_str(), %id, bytes = body.len(), "stored upload");

    Ok(Json(Uploaded {
        id,
        url: format!("/api/files/{}/{id}", bucket.as_str()),
        filename,
    }))
}
