//! Registration, login and the identity list

use crate::config::AppState;
use crate::error::{Error, Result};
use crate::models::{Identity, Profile};
use crate::presence::PresenceRegistry;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone_number: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
}

/// Overlays live presence on a stored profile.
pub(crate) fn with_presence(registry: &PresenceRegistry, mut profile: Profile) -> Profile {
    profile.is_online = registry.is_online(&profile.identity);
    profile.last_seen = profile.last_seen.max(registry.last_seen(&profile.identity));
    profile
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Profile>)> {
    info!("POST /api/register - {}", req.phone_number);

    let identity = Identity::parse_phone(&req.phone_number)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(Error::Validation("Display name required".to_string()));
    }

    let profile = state.directory.register(&identity, display_name).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/login
///
/// Password-less: checks that the number is registered. Presence only
/// changes when a socket joins.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Profile>> {
    info!("POST /api/login - {}", req.phone_number);

    let identity = Identity::parse_phone(&req.phone_number)?;
    let profile = state
        .directory
        .identity(&identity)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
    Ok(Json(with_presence(&state.registry, profile)))
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Profile>>> {
    info!("GET /api/users");

    let users = state
        .directory
        .list_identities()
        .await?
        .into_iter()
        .map(|profile| with_presence(&state.registry, profile))
        .collect();
    Ok(Json(users))
}
