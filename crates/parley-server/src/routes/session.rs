use crate::configuration::{Starter, DEFAULT_PROMPT};
use crate::error::SessionError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    profile: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
    profile: String,
    system_prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsRequest {
    #[serde(default)]
    system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsResponse {
    system_prompt: String,
}

#[derive(Debug, Serialize)]
struct Profile {
    name: String,
    default: bool,
}

#[derive(Debug, Serialize)]
struct ProfilesResponse {
    profiles: Vec<Profile>,
}

#[derive(Debug, Serialize)]
struct StartersResponse {
    starters: Vec<Starter>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, SessionError> {
    let (session_id, session) = state.create_session(request.profile).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            profile: session.profile().to_string(),
            system_prompt: session.system_prompt().await,
        }),
    ))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, SessionError> {
    state.remove_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// A settings update without a prompt restores the default one
async fn update_settings(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, SessionError> {
    let session = state.session(&session_id).await?;
    let system_prompt = request
        .system_prompt
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    session.set_system_prompt(system_prompt.clone()).await;
    Ok(Json(SettingsResponse { system_prompt }))
}

async fn list_profiles(State(state): State<AppState>) -> Json<ProfilesResponse> {
    let chat = state.chat();
    Json(ProfilesResponse {
        profiles: chat
            .profiles
            .iter()
            .map(|name| Profile {
                name: name.clone(),
                default: *name == chat.default_profile,
            })
            .collect(),
    })
}

async fn list_starters(State(state): State<AppState>) -> Json<StartersResponse> {
    Json(StartersResponse {
        starters: state.chat().starters.clone(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/settings", put(update_settings))
        .route("/profiles", get(list_profiles))
        .route("/starters", get(list_starters))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::mock_state;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use parley::providers::mock::MockEngine;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_session_with_default_profile() {
        let state = mock_state(MockEngine::default());
        let (status, body) = send(
            routes(state.clone()),
            json_request("POST", "/sessions", json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["profile"], json!("bielik:7bQ8"));
        assert_eq!(body["systemPrompt"], json!(DEFAULT_PROMPT));
        let id = body["sessionId"].as_str().unwrap();
        assert!(state.session(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_session_with_unknown_profile() {
        let state = mock_state(MockEngine::default());
        let (status, body) = send(
            routes(state),
            json_request("POST", "/sessions", json!({"profile": "gpt-2"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Unknown chat profile: gpt-2"));
    }

    #[tokio::test]
    async fn test_update_settings() {
        let state = mock_state(MockEngine::default());
        let (id, session) = state.create_session(None).await.unwrap();

        let (status, body) = send(
            routes(state.clone()),
            json_request(
                "PUT",
                &format!("/sessions/{}/settings", id),
                json!({"systemPrompt": "Odpowiadaj wierszem."}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["systemPrompt"], json!("Odpowiadaj wierszem."));
        assert_eq!(session.system_prompt().await, "Odpowiadaj wierszem.");

        let (_, body) = send(
            routes(state.clone()),
            json_request("PUT", &format!("/sessions/{}/settings", id), json!({})),
        )
        .await;
        assert_eq!(body["systemPrompt"], json!(DEFAULT_PROMPT));

        let (status, _) = send(
            routes(state),
            json_request("PUT", "/sessions/missing/settings", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let state = mock_state(MockEngine::default());
        let (id, _) = state.create_session(None).await.unwrap();
        let delete = |id: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/sessions/{}", id))
                .body(Body::empty())
                .unwrap()
        };

        let (status, _) = send(routes(state.clone()), delete(&id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(matches!(
            state.session(&id).await,
            Err(SessionError::NotFound(_))
        ));

        let (status, body) = send(routes(state), delete(&id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!(format!("Unknown chat session: {}", id)));
    }

    #[tokio::test]
    async fn test_profiles_and_starters() {
        let state = mock_state(MockEngine::default());

        let request = Request::builder()
            .uri("/profiles")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(routes(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"profiles": [
                {"name": "bielik:7b", "default": false},
                {"name": "bielik:7bQ4", "default": false},
                {"name": "bielik:7bQ8", "default": true}
            ]})
        );

        let request = Request::builder()
            .uri("/starters")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(routes(state), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["starters"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["starters"][0]["label"], json!("Poezja"));
    }
}
