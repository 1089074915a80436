use axum::{
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /profiles/pictures/:file - Serve a stored profile picture
///
/// The content type is sniffed from the stored bytes rather than taken from
/// the file name.
pub async fn picture_get(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let asset = state.pictures.open(&file).await?;

    Ok((
        [(CONTENT_TYPE, asset.content_type), (CACHE_CONTROL, "no-cache")],
        asset.content,
    )
        .into_response())
}
