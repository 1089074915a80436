use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::utils::{ensure_owner, expected_version, json_rejection};
use crate::app::AppState;
use crate::database::{Address, ValidationErrors};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

/// Missing fields become empty strings so they surface as field errors.
#[derive(Debug, Deserialize)]
pub struct CreateAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub post_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country_code: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAddress {
    pub street: Option<String>,
    pub post_code: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
}

impl UpdateAddress {
    fn apply(&self, address: &mut Address) {
        if let Some(street) = &self.street {
            address.street = street.clone();
        }
        if let Some(post_code) = &self.post_code {
            address.post_code = post_code.clone();
        }
        if let Some(city) = &self.city {
            address.city = city.clone();
        }
        if let Some(country_code) = &self.country_code {
            address.country_code = country_code.clone();
        }
    }
}

/// POST /addresses - Create the caller's address
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    payload: Result<Json<CreateAddress>, JsonRejection>,
) -> ApiResult<Address> {
    let Json(input) = payload.map_err(json_rejection)?;
    let draft = Address::new(subject.id, input.street, input.post_code, input.city, input.country_code);

    let created = state.addresses.insert(draft).await?;
    tracing::info!("Created address {} for {}", created.meta.id, subject.id);

    Ok(ApiResponse::accepted(created))
}

/// GET /addresses/me - The caller's own address
pub async fn me(State(state): State<AppState>, CurrentUser(subject): CurrentUser) -> ApiResult<Address> {
    let address = state.addresses.get_by_owner(subject.id).await?;
    Ok(ApiResponse::success(address))
}

/// PATCH /addresses/:id - Partial update guarded by the record version
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<UpdateAddress>, JsonRejection>,
) -> ApiResult<Address> {
    let requested_version = expected_version(&headers)?;
    let Json(changes) = payload.map_err(json_rejection)?;

    let current = state.addresses.get_by_id(id).await?;
    ensure_owner(&subject, current.meta.owner)?;
    let expected = requested_version.unwrap_or(current.meta.version);

    let updated = state
        .addresses
        .update_loaded(current, expected, move |address| -> Result<(), ValidationErrors> {
            changes.apply(address);
            Ok(())
        })
        .await?;

    Ok(ApiResponse::success(updated))
}
