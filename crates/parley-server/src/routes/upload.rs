use crate::error::SessionError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest accepted upload body
const UPLOAD_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    path: PathBuf,
}

// The raw request body is the file; the returned path goes into reply elements
async fn upload(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, SessionError> {
    state.session(&session_id).await?;
    let path = state
        .store_upload(&session_id, query.name.as_deref(), &body)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { path })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/sessions/:id/uploads", post(upload))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::upload_state;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use parley::providers::mock::MockEngine;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send_upload(state: AppState, uri: &str, bytes: &'static [u8]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/octet-stream")
            .body(Body::from(bytes))
            .unwrap();
        let response = routes(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_upload_is_stored_under_session() -> anyhow::Result<()> {
        let uploads = tempfile::tempdir()?;
        let state = upload_state(MockEngine::default(), uploads.path());
        let (id, _) = state.create_session(None).await?;

        let (status, body) = send_upload(
            state.clone(),
            &format!("/sessions/{}/uploads?name=raport.pdf", id),
            b"%PDF-1.5",
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let path = PathBuf::from(body["path"].as_str().unwrap_or_default());
        assert!(path.starts_with(uploads.path().join(&id)));
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("pdf"));
        assert_eq!(std::fs::read(&path)?, b"%PDF-1.5");
        // The stored file is accepted as an attachment
        assert!(state.confine_upload(Some(path)).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_to_unknown_session() -> anyhow::Result<()> {
        let uploads = tempfile::tempdir()?;
        let state = upload_state(MockEngine::default(), uploads.path());

        let (status, _) = send_upload(state, "/sessions/missing/uploads?name=a.txt", b"x").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(std::fs::read_dir(uploads.path())?.count(), 0);
        Ok(())
    }
}
