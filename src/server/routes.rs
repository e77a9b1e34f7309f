//! HTTP route handlers for the widget and CRM APIs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::sync::actors::{CrmConversationView, SendOutcome, WidgetSnapshot};
use crate::sync::core::control::ControlState;
use crate::sync::core::errors::SyncError;
use crate::sync::core::ids::VisitorSessionId;
use crate::sync::core::message::Message;
use crate::sync::store::record::ConversationSummary;

use super::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/widget/sessions", post(create_session))
        .route("/api/widget/sessions/{id}", get(widget_snapshot))
        .route("/api/widget/sessions/{id}/messages", post(send_user_message))
        .route("/api/crm/conversations", get(list_conversations))
        .route("/api/crm/conversations/{id}", get(crm_conversation))
        .route("/api/crm/conversations/{id}/take-control", post(take_control))
        .route("/api/crm/conversations/{id}/hand-back", post(hand_back))
        .route("/api/crm/conversations/{id}/messages", post(send_operator_message))
        .route("/api/crm/conversations/{id}/ai-reply", post(ai_reply))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatbridge",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Body of a message post from either side.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    /// Message text.
    pub text: String,
}

/// Result of a control action.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    /// Whether the action flipped the state.
    pub changed: bool,
    /// State after the action.
    pub control: ControlState,
}

/// Result of an automated fallback reply.
#[derive(Debug, Serialize)]
pub struct AiReplyResponse {
    /// The appended reply, absent when no reply was due.
    pub reply: Option<Message>,
}

fn error_response(err: &SyncError) -> (StatusCode, String) {
    let status = match err {
        SyncError::UnknownConversation(_) => StatusCode::NOT_FOUND,
        SyncError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
        err if err.is_store_failure() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn session_id(raw: &str) -> ApiResult<VisitorSessionId> {
    VisitorSessionId::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid session id: {e}")))
}

/// Open a new visitor session.
async fn create_session(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<WidgetSnapshot>)> {
    let widget = state.create_widget().await.map_err(|e| error_response(&e))?;
    Ok((StatusCode::CREATED, Json(widget.snapshot().await)))
}

/// What the visitor currently sees.
async fn widget_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WidgetSnapshot>> {
    let id = session_id(&id)?;
    let widget = state.widget(&id).await.map_err(|e| error_response(&e))?;
    Ok(Json(widget.snapshot().await))
}

/// Visitor posts a message.
async fn send_user_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> ApiResult<Json<SendOutcome>> {
    let id = session_id(&id)?;
    let outcome = state
        .send_visitor_message(&id, &request.text)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(outcome))
}

/// Conversation list, most recent activity first.
async fn list_conversations(State(state): State<Arc<AppState>>) -> Json<Vec<ConversationSummary>> {
    Json(state.crm.conversations().await)
}

/// Operator view of one conversation; also selects it.
async fn crm_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CrmConversationView>> {
    let id = session_id(&id)?;
    state.crm.select(&id).await.map_err(|e| error_response(&e))?;
    state
        .crm
        .conversation(&id)
        .await
        .map(Json)
        .ok_or_else(|| error_response(&SyncError::UnknownConversation(id.to_string())))
}

async fn control_response(state: &AppState, id: &VisitorSessionId, changed: bool) -> ApiResult<Json<ControlResponse>> {
    let view = state
        .crm
        .conversation(id)
        .await
        .ok_or_else(|| error_response(&SyncError::UnknownConversation(id.to_string())))?;
    Ok(Json(ControlResponse {
        changed,
        control: view.control,
    }))
}

/// Operator takes over the conversation.
async fn take_control(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ControlResponse>> {
    let id = session_id(&id)?;
    let changed = state.crm.take_control(&id).await.map_err(|e| error_response(&e))?;
    control_response(&state, &id, changed).await
}

/// Operator returns the conversation to the responder.
async fn hand_back(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ControlResponse>> {
    let id = session_id(&id)?;
    let changed = state.crm.hand_back_to_ai(&id).await.map_err(|e| error_response(&e))?;
    control_response(&state, &id, changed).await
}

/// Operator posts a message.
async fn send_operator_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> ApiResult<Json<Message>> {
    let id = session_id(&id)?;
    let message = state
        .crm
        .send_operator_message(&id, &request.text)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(message))
}

/// CRM-side automated reply for a conversation left waiting.
async fn ai_reply(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AiReplyResponse>> {
    let id = session_id(&id)?;
    let reply = state.crm.send_ai_fallback(&id).await.map_err(|e| error_response(&e))?;
    Ok(Json(AiReplyResponse { reply }))
}
