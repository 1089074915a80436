// handlers/protected/profiles.rs - Profile endpoints
//
// Both write endpoints take multipart forms: a `profile_name` text part and an
// optional `profile_picture` file part.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::HeaderMap,
};
use uuid::Uuid;

use super::utils::{ensure_owner, expected_version, multipart_error, multipart_rejection};
use crate::app::AppState;
use crate::assets::Upload;
use crate::database::{Profile, ValidationErrors};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};

#[derive(Debug, Default)]
struct ProfileForm {
    profile_name: Option<String>,
    picture: Option<Upload>,
}

/// Collects the known parts of a profile form; unknown parts are skipped.
async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<ProfileForm, ApiError> {
    let mut multipart = multipart.map_err(multipart_rejection)?;
    let mut form = ProfileForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("profile_name") => {
                form.profile_name = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("profile_picture") => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let content = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen
                if !content.is_empty() {
                    form.picture = Some(Upload { filename, content });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /profiles - Create the caller's profile
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Profile> {
    let form = read_form(multipart).await?;
    let draft = Profile::new(subject.id, form.profile_name.unwrap_or_default());

    let created = state.pictures.create(draft, form.picture).await?;
    tracing::info!("Created profile {} for {}", created.meta.id, subject.id);

    Ok(ApiResponse::created(created))
}

/// GET /profiles/me - The caller's own profile
pub async fn me(State(state): State<AppState>, CurrentUser(subject): CurrentUser) -> ApiResult<Profile> {
    let profile = state.profiles.get_by_owner(subject.id).await?;
    Ok(ApiResponse::success(profile))
}

/// PATCH /profiles/:id - Update name and/or picture
///
/// The picture write and the field changes land in one version step. The
/// expected version comes from `If-Match`, or the freshly loaded row.
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Profile> {
    let requested_version = expected_version(&headers)?;
    let form = read_form(multipart).await?;

    let current = state.profiles.get_by_id(id).await?;
    ensure_owner(&subject, current.meta.owner)?;
    let expected = requested_version.unwrap_or(current.meta.version);

    let profile_name = form.profile_name;
    let edit = move |profile: &mut Profile| -> Result<(), ValidationErrors> {
        if let Some(name) = &profile_name {
            profile.profile_name = name.clone();
        }
        Ok(())
    };

    let updated = match form.picture {
        Some(upload) => state.pictures.replace(current, expected, upload, edit).await?,
        None => state.profiles.update_loaded(current, expected, edit).await?,
    };

    Ok(ApiResponse::success(updated))
}
