use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use super::AppState;

const CHAT_PAGE: &str = include_str!("../../templates/chat.html");

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub msg: String,
}

/// `GET /`: the chat UI. No state change.
pub async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// `POST /get`: answer the form-encoded question against the live session
/// and append the turn to memory. The answer is returned as plain text.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ChatForm>,
) -> Result<String, ApiError> {
    if form.msg.trim().is_empty() {
        return Err(ApiError::BadRequest("msg must not be empty".to_string()));
    }

    info!("User: {}", form.msg);

    let mut session = state.session().lock().await;
    let answer = session.ask(&form.msg).await.map_err(|e| {
        error!("Failed to answer question: {e}");
        ApiError::internal(e)
    })?;

    info!("AI: {answer}");
    Ok(answer)
}

/// `POST /reset`: discard the session and start a fresh one. All prior
/// conversation context becomes unavailable to subsequent `/get` calls.
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut session = state.session().lock().await;
    *session = state.fresh_session();

    info!("Memory reset successfully");
    Json(json!({ "status": "success", "message": "Memory cleared" }))
}
