//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ConversationSnapshot, CreateConversationPayload, ErrorResponse, ExamStateResponse,
        PostMessagePayload, TurnResponse, TutorReplyPayload,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_conversation,
        handlers::get_conversation,
        handlers::post_message,
        handlers::post_tutor_reply,
        handlers::create_exam,
        handlers::get_exam,
        handlers::start_exam,
    ),
    components(
        schemas(
            ConversationSnapshot, CreateConversationPayload, PostMessagePayload,
            TutorReplyPayload, TurnResponse, ExamStateResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Tutor API", description = "Adaptive tutoring conversations and review exams")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/conversations", post(handlers::create_conversation))
        .route("/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/conversations/{id}/messages",
            post(handlers::post_message),
        )
        .route(
            "/conversations/{id}/replies",
            post(handlers::post_tutor_reply),
        )
        .route(
            "/exam",
            get(handlers::get_exam).post(handlers::create_exam),
        )
        .route("/exam/start", post(handlers::start_exam))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
