use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{error::ApiError, state::AppState};
use crate::application::services::SessionStatus;
use crate::domain::{Answer, ConversationTurn, Document, DomainError};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub status: SessionStatus,
}

#[derive(Debug, Deserialize)]
pub struct ProcessDocumentRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub top_k: Option<usize>,
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.sessions.create()?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            id: session.id(),
            status: session.status()?,
        }),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(id)?;
    Ok(Json(SessionResponse {
        id,
        status: session.status()?,
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn process_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProcessDocumentRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| DomainError::invalid_input(e.body_text()))?;
    let limit = state.config.config.server.max_document_bytes;
    if request.content.len() > limit {
        return Err(DomainError::invalid_input(format!(
            "document is {} bytes, limit is {limit}",
            request.content.len()
        ))
        .into());
    }

    let session = state.sessions.get(id)?;
    let document = Document::new(request.name, request.content);
    let status = session.process_document(document).await?;
    Ok(Json(SessionResponse { id, status }))
}

pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, ApiError> {
    let session = state.sessions.get(id)?;
    let answer = match request.top_k {
        Some(top_k) => session.ask_top_k(&request.question, top_k).await?,
        None => session.ask(&request.question).await?,
    };
    Ok(Json(answer))
}

pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ConversationTurn>>, ApiError> {
    Ok(Json(state.sessions.get(id)?.history()?))
}

pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.get(id)?.clear_history()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(id)?;
    session.reset()?;
    Ok(Json(SessionResponse {
        id,
        status: session.status()?,
    }))
}
