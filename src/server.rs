//! HTTP/WebSocket presentation boundary.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::questionnaire::{QuestionnaireFlow, QuestionnaireRouteState, questionnaire_routes};
use crate::session::{ChatRouteState, CoachChat, chat_routes};

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "life-coach"
    }))
}

/// Build the full application router.
pub fn app_router(flow: Arc<QuestionnaireFlow>, chat: Arc<CoachChat>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(questionnaire_routes(QuestionnaireRouteState { flow }))
        .merge(chat_routes(ChatRouteState { chat }))
        .layer(CorsLayer::permissive())
}
