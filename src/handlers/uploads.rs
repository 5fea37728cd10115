use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{PresignedUrlRequest, PresignedUrlResponse},
    permissions, storage,
};

/// get_presigned_url
///
/// [Authenticated Route] Hands out a short-lived PUT URL so media (server
/// banners, map images, product images) goes straight from the browser to the
/// bucket. Requires `uploads.create`. The object key is generated here; only
/// the extension of the client's filename is kept.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Not an image"),
        (status = 403, description = "Missing uploads.create")
    )
)]
pub async fn get_presigned_url(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    auth.require(permissions::UPLOADS_CREATE)?;
    if !payload.file_type.starts_with("image/") {
        return Err(AppError::bad_request("Only image uploads are accepted"));
    }

    let object_key = storage::media_key(&payload.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(AppError::Storage)?;

    tracing::info!(user_id = %auth.id, key = %object_key, "presigned upload issued");
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}
