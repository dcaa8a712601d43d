//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for tutoring
//! conversations and review exams. It uses `utoipa` doc comments to generate
//! OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tutor_core::exam::ExamError;
use uuid::Uuid;

use crate::{
    models::{
        ConversationSnapshot, CreateConversationPayload, ErrorResponse, ExamStateResponse,
        PostMessagePayload, TurnResponse, TutorReplyPayload,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse { message }),
            )
                .into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn require_user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))
}

fn conversation_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Conversation with id '{}' not found", id))
}

/// Start a new tutoring conversation.
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationPayload,
    responses(
        (status = 201, description = "Conversation created successfully", body = ConversationSnapshot),
        (status = 400, description = "Bad request", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user starting the conversation")
    )
)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;
    let topic = payload.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("topic must not be empty".to_string()));
    }

    let handle = state.conversations.create(user_id, topic).await;
    let snapshot = ConversationSnapshot::from(&*handle.lock().await);
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Get the current understanding state of a conversation.
#[utoipa::path(
    get,
    path = "/conversations/{id}",
    responses(
        (status = 200, description = "Conversation details", body = ConversationSnapshot),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationSnapshot>, ApiError> {
    let user_id = require_user_id(&headers)?;
    let handle = state
        .conversations
        .get(id, user_id)
        .await
        .ok_or_else(|| conversation_not_found(id))?;
    let snapshot = ConversationSnapshot::from(&*handle.lock().await);
    Ok(Json(snapshot))
}

/// Submit a learner message and receive guidance for the tutor's next reply.
#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    request_body = PostMessagePayload,
    responses(
        (status = 200, description = "Turn processed", body = TurnResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostMessagePayload>,
) -> Result<Json<TurnResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;
    if payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_string()));
    }

    let handle = state
        .conversations
        .get(id, user_id)
        .await
        .ok_or_else(|| conversation_not_found(id))?;

    // Held for the whole turn so messages on one conversation are processed in order.
    let mut conversation = handle.lock().await;
    let guidance = conversation
        .session
        .process_turn(&state.analyzer, &payload.content)
        .await;

    Ok(Json(TurnResponse {
        guidance,
        understanding: conversation.session.understanding.clone(),
    }))
}

/// Record the tutor's reply so it is used as context for later messages.
#[utoipa::path(
    post,
    path = "/conversations/{id}/replies",
    request_body = TutorReplyPayload,
    responses(
        (status = 200, description = "Reply recorded", body = ConversationSnapshot),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Conversation ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn post_tutor_reply(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TutorReplyPayload>,
) -> Result<Json<ConversationSnapshot>, ApiError> {
    let user_id = require_user_id(&headers)?;
    let handle = state
        .conversations
        .get(id, user_id)
        .await
        .ok_or_else(|| conversation_not_found(id))?;

    let mut conversation = handle.lock().await;
    conversation.session.record_tutor_reply(payload.content);
    Ok(Json(ConversationSnapshot::from(&*conversation)))
}

/// Generate a new review exam from the user's saved learning entries.
#[utoipa::path(
    post,
    path = "/exam",
    responses(
        (status = 201, description = "Exam generated", body = ExamStateResponse),
        (status = 409, description = "An exam is already being generated", body = ErrorResponse),
        (status = 422, description = "Not enough learning material", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn create_exam(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;
    state
        .exams
        .begin(user_id)
        .await
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    // Generation runs detached so the status leaves `generating` even when
    // the client goes away before it completes.
    let task_state = state.clone();
    let owner = user_id.to_string();
    let generation = tokio::spawn(async move {
        let store = task_state.learning.store_for(&owner);
        let outcome = task_state
            .exam_pipeline
            .generate_from_store(store.as_ref())
            .await;
        let record = task_state.exams.finish(&owner, &outcome).await;
        (outcome, record)
    });
    let (outcome, record) = generation.await?;
    let record = record.map_err(|e| ApiError::Conflict(e.to_string()))?;

    match outcome {
        Ok(exam) => {
            info!(user_id, exam_id = %exam.id, origin = ?exam.origin, "Exam generated");
            Ok((StatusCode::CREATED, Json(ExamStateResponse::from(record))))
        }
        Err(err @ ExamError::InsufficientMaterial { .. }) => {
            warn!(user_id, error = %err, "Exam generation rejected");
            Err(ApiError::Unprocessable(err.to_string()))
        }
        Err(ExamError::Store(err)) => Err(ApiError::InternalServerError(err)),
    }
}

/// Get the user's current exam and its status.
#[utoipa::path(
    get,
    path = "/exam",
    responses(
        (status = 200, description = "Current exam state", body = ExamStateResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_exam(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ExamStateResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;
    Ok(Json(state.exams.get(user_id).await.into()))
}

/// Begin answering a ready exam.
#[utoipa::path(
    post,
    path = "/exam/start",
    responses(
        (status = 200, description = "Exam started", body = ExamStateResponse),
        (status = 409, description = "No ready exam to start", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn start_exam(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ExamStateResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;
    let record = state
        .exams
        .start(user_id)
        .await
        .map_err(|e| ApiError::Conflict(e.to_string()))?;
    Ok(Json(record.into()))
}
