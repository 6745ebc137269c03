mod file;
mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::Deserialize;

use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Where an uploaded payload lives. Voice notes and images are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Voices,
    Images,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        use Bucket::*;
        match self {
            Voices => "voices",
            Images => "images",
        }
    }

    pub(crate) fn fallback_content_type(&self) -> &'static str {
        use Bucket::*;
        match self {
            Voices => "audio/webm",
            Images => "image/jpeg",
        }
    }

    pub(crate) fn file_name(&self, millis: i64, nonce: u32) -> String {
        use Bucket::*;
        match self {
            Voices => format!("voice-{millis}-{nonce}.webm"),
            Images => format!("image-{millis}-{nonce}"),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload/{bucket}",
            post(upload::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/files/{bucket}/{id}", get(file::file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_come_from_the_path() {
        assert_eq!(serde_json::from_str::<Bucket>("\"voices\"").unwrap(), Bucket::Voices);
        assert_eq!(serde_json::from_str::<Bucket>("\"images\"").unwrap(), Bucket::Images);
        assert!(serde_json::from_str::<Bucket>("\"videos\"").is_err());
    }

    #[tokio::test]
    async fn uploads_are_served_back_inline() {
        use axum::{
            body::{Bytes, to_bytes},
            extract::{Path, State},
            http::{HeaderMap, HeaderValue, StatusCode, header},
            response::IntoResponse,
        };

        let db_pool = crate::db::memory_pool().await.unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));

        let axum::Json(uploaded) = upload::upload(
            Path(Bucket::Images),
            State(db_pool.clone()),
            headers,
            Bytes::from_static(b"\x89PNG"),
        )
        .await
        .unwrap();
        assert_eq!(uploaded.url, format!("/api/files/images/{}", uploaded.id));
        assert!(uploaded.filename.starts_with("image-"));

        let response = file::file(Path((Bucket::Images, uploaded.id)), State(db_pool.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\x89PNG");

        // a voice id never resolves in the image bucket and vice versa
        let response = file::file(Path((Bucket::Voices, uploaded.id)), State(db_pool))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn voice_files_are_webm() {
        assert_eq!(Bucket::Voices.file_name(1700000000000, 42), "voice-1700000000000-42.webm");
        assert_eq!(Bucket::Images.file_name(1, 2), "image-1-2");
    }
}
