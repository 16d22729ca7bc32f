//! Message send, history, delete, hide and search

use crate::config::AppState;
use crate::error::Result;
use crate::models::{Attachment, Identity, Message, NewMessage};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender: String,
    pub receiver: Option<String>,
    pub group_id: Option<String>,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    /// Whose hidden messages to leave out of group history
    pub viewer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HideRequest {
    pub identity: String,
}

/// POST /api/messages
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    info!(
        "POST /api/messages - {} -> {}",
        req.sender,
        req.receiver.as_deref().or(req.group_id.as_deref()).unwrap_or("?")
    );

    let new = NewMessage {
        sender: Some(Identity::new(req.sender)?),
        receiver: req.receiver.map(Identity::new).transpose()?,
        group_id: req.group_id,
        body: req.body,
        attachment: req.attachment,
    };
    let message = state.hub.send(new).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/messages/{reader}/{peer}
///
/// Also the read-receipt trigger for everything `peer` sent to `reader`.
pub async fn get_conversation(
    Path((reader, peer)): Path<(String, String)>,
    Query(params): Query<PageParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>> {
    info!("GET /api/messages/{}/{}", reader, peer);

    let reader = Identity::new(reader)?;
    let peer = Identity::new(peer)?;
    let limit = state.config.page_limit(params.limit);
    Ok(Json(
        state.hub.open_conversation(&reader, &peer, limit).await?,
    ))
}

/// GET /api/group-messages/{group_id}
pub async fn get_group_messages(
    Path(group_id): Path<String>,
    Query(params): Query<PageParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>> {
    info!("GET /api/group-messages/{}", group_id);

    let viewer = params.viewer.map(Identity::new).transpose()?;
    let limit = state.config.page_limit(params.limit);
    Ok(Json(
        state
            .hub
            .group_history(&group_id, viewer.as_ref(), limit)
            .await?,
    ))
}

/// DELETE /api/messages/{message_id}
pub async fn delete_message(
    Path(message_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>> {
    info!("DELETE /api/messages/{}", message_id);

    let removed = state.hub.delete(&message_id).await?;
    Ok(Json(json!({ "deleted": removed.id })))
}

/// POST /api/messages/{message_id}/hide
pub async fn hide_message(
    Path(message_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<HideRequest>,
) -> Result<StatusCode> {
    info!("POST /api/messages/{}/hide - {}", message_id, req.identity);

    let identity = Identity::new(req.identity)?;
    state.hub.hide(&message_id, &identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/search-messages/{identity}/{query}
pub async fn search_messages(
    Path((identity, query)): Path<(String, String)>,
    Query(params): Query<PageParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Message>>> {
    info!("GET /api/search-messages/{}/{}", identity, query);

    let identity = Identity::new(identity)?;
    let limit = state.config.page_limit(params.limit);
    Ok(Json(state.hub.search(&identity, &query, limit).await?))
}
