//! Group creation and listing

use crate::config::AppState;
use crate::error::Result;
use crate::models::{Group, Identity};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub members: Vec<String>,
    pub created_by: String,
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>)> {
    info!("POST /api/groups - {} by {}", req.name, req.created_by);

    let creator = Identity::new(req.created_by)?;
    let members = req
        .members
        .into_iter()
        .map(Identity::new)
        .collect::<Result<Vec<_>>>()?;

    let group = state.hub.create_group(&req.name, members, &creator).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET /api/groups/{identity}
pub async fn list_groups(
    Path(identity): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Group>>> {
    info!("GET /api/groups/{}", identity);

    let identity = Identity::new(identity)?;
    Ok(Json(state.directory.groups_for(&identity).await?))
}
