//! Address book route handlers.

use axum::{Json, extract::State, http::StatusCode};

use marketstall_core::AddressId;

use crate::error::Result;
use crate::extract::{ValidJson, ValidPath};
use crate::middleware::RequireAuth;
use crate::models::address::{Address, AddressInput, AddressPatch};
use crate::services::addresses::AddressService;
use crate::state::AppState;

/// GET /api/addresses
///
/// Default address first.
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressService::new(state.pool()).list(user.id).await?;
    Ok(Json(addresses))
}

/// POST /api/addresses
///
/// # Errors
///
/// Returns 400 if a required field is blank.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(input): ValidJson<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = AddressService::new(state.pool())
        .create(user.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// GET /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address is not the user's.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(id): ValidPath<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressService::new(state.pool()).get(user.id, id).await?;
    Ok(Json(address))
}

/// PUT /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address is not the user's, 400 if a required field is blank.
pub async fn replace(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(id): ValidPath<AddressId>,
    ValidJson(input): ValidJson<AddressInput>,
) -> Result<Json<Address>> {
    let address = AddressService::new(state.pool())
        .replace(user.id, id, input)
        .await?;
    Ok(Json(address))
}

/// PATCH /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address is not the user's, 400 if a required field becomes blank.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(id): ValidPath<AddressId>,
    ValidJson(patch): ValidJson<AddressPatch>,
) -> Result<Json<Address>> {
    let address = AddressService::new(state.pool())
        .update(user.id, id, patch)
        .await?;
    Ok(Json(address))
}

/// DELETE /api/addresses/{id}
///
/// # Errors
///
/// Returns 404 if the address is not the user's.
pub async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(id): ValidPath<AddressId>,
) -> Result<StatusCode> {
    AddressService::new(state.pool()).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
