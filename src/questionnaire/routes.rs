//! REST endpoints for the questionnaire screen.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use super::flow::QuestionnaireFlow;
use crate::error::QuestionnaireError;

/// Shared state for questionnaire routes.
#[derive(Clone)]
pub struct QuestionnaireRouteState {
    pub flow: Arc<QuestionnaireFlow>,
}

#[derive(Deserialize)]
struct ToggleRequest {
    question_id: String,
    option_id: String,
}

/// GET /api/questionnaire
async fn get_questionnaire(State(state): State<QuestionnaireRouteState>) -> impl IntoResponse {
    Json(state.flow.snapshot().await)
}

/// POST /api/questionnaire/toggle
///
/// Returns the question's ranked selection and the refreshed screen.
async fn toggle_option(
    State(state): State<QuestionnaireRouteState>,
    Json(body): Json<ToggleRequest>,
) -> Response {
    match state.flow.toggle(&body.question_id, &body.option_id).await {
        Ok(ranked) => Json(serde_json::json!({
            "question_id": body.question_id,
            "ranked": ranked,
            "questionnaire": state.flow.snapshot().await,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/questionnaire/advance
async fn advance(State(state): State<QuestionnaireRouteState>) -> Response {
    match state.flow.advance().await {
        Ok(_) => Json(state.flow.snapshot().await).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/questionnaire/retreat
async fn retreat(State(state): State<QuestionnaireRouteState>) -> impl IntoResponse {
    state.flow.retreat().await;
    Json(state.flow.snapshot().await)
}

/// POST /api/questionnaire/reset
async fn reset(State(state): State<QuestionnaireRouteState>) -> impl IntoResponse {
    state.flow.reset_all().await;
    Json(state.flow.snapshot().await)
}

/// GET /api/questionnaire/summary
///
/// The profile text the coach receives with every message.
async fn summary(State(state): State<QuestionnaireRouteState>) -> impl IntoResponse {
    let responses = state.flow.responses();
    Json(serde_json::json!({
        "summary": responses.formatted_summary().await,
        "completed": responses.is_questionnaire_completed().await,
    }))
}

fn error_response(error: QuestionnaireError) -> Response {
    debug!(error = %error, "Questionnaire request rejected");
    let status = match error {
        QuestionnaireError::UnknownQuestion { .. } | QuestionnaireError::UnknownOption { .. } => {
            StatusCode::BAD_REQUEST
        }
        QuestionnaireError::NotAnswered { .. } | QuestionnaireError::NotOnQuestion => {
            StatusCode::CONFLICT
        }
    };
    (
        status,
        Json(serde_json::json!({"error": error.to_string()})),
    )
        .into_response()
}

/// Build the questionnaire REST routes.
pub fn questionnaire_routes(state: QuestionnaireRouteState) -> Router {
    Router::new()
        .route("/api/questionnaire", get(get_questionnaire))
        .route("/api/questionnaire/toggle", post(toggle_option))
        .route("/api/questionnaire/advance", post(advance))
        .route("/api/questionnaire/retreat", post(retreat))
        .route("/api/questionnaire/reset", post(reset))
        .route("/api/questionnaire/summary", get(summary))
        .with_state(state)
}
