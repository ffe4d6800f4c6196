use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use serde_json::json;
use tracing::{error, info};

use super::{missing, purge_photos, AppState};
use crate::auth::Auth;
use crate::authz::{authorize, Relation};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::{DestinationRepo, PhotoRepo};

pub const PHOTO_SIZE_LIMIT: usize = 10 * 1024 * 1024;
const MAX_CAPTION_LEN: usize = 500;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload/{destination_id}", web::post().to(upload_photo))
        .route("/{destination_id}", web::get().to(list_photos))
        .route("/{photo_id}", web::delete().to(delete_photo));
}

pub fn folder_for(destination_id: Id) -> String {
    format!("wanderlog/photos/{destination_id}")
}

struct Upload {
    bytes: Vec<u8>,
    caption: Option<String>,
}

async fn read_upload(mut payload: Multipart) -> Result<Upload, ApiError> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut caption: Option<String> = None;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let limit = match name.as_str() {
            "photo" => PHOTO_SIZE_LIMIT,
            "caption" => MAX_CAPTION_LEN * 4,
            _ => continue,
        };
        let mut buf = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
        {
            if buf.len() + chunk.len() > limit {
                return Err(ApiError::Validation(format!("{name} is too large")));
            }
            buf.extend_from_slice(&chunk);
        }
        if name == "photo" {
            bytes = Some(buf);
        } else {
            let text = String::from_utf8(buf).map_err(|_| ApiError::Validation("caption must be text".into()))?;
            caption = Some(text).filter(|c| !c.trim().is_empty());
        }
    }
    let bytes = bytes.filter(|b| !b.is_empty()).ok_or_else(|| ApiError::Validation("No photo uploaded".into()))?;
    if !infer::is_image(&bytes) {
        return Err(ApiError::Validation("photo must be an image".into()));
    }
    if caption.as_ref().is_some_and(|c| c.chars().count() > MAX_CAPTION_LEN) {
        return Err(ApiError::Validation(format!("caption must be at most {MAX_CAPTION_LEN} characters")));
    }
    Ok(Upload { bytes, caption })
}

#[utoipa::path(
    post,
    path = "/photos/upload/{destination_id}",
    params(("destination_id" = String, Path, description = "Parent destination")),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "`photo` file (max 10 MiB) and optional `caption`"),
    responses(
        (status = 201, description = "Photo stored", body = Photo),
        (status = 400, description = "Missing or non-image file", body = ApiErrorBody),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Destination not found", body = ApiErrorBody),
        (status = 502, description = "Photo storage failed", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_photo(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let destination = data.repo.get_destination(path.into_inner()).await.map_err(missing("Destination"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &destination, Relation::IsOwner).await?;
    let upload = read_upload(payload).await?;

    let stored = data.assets.store(upload.bytes, &folder_for(destination.id)).await?;
    let new = NewPhoto {
        destination_id: destination.id,
        url: stored.url,
        caption: upload.caption,
        asset_id: stored.asset_id.clone(),
    };
    let photo = match data.repo.create_photo(new).await {
        Ok(photo) => photo,
        Err(e) => {
            // the record never landed, so the stored binary has no owner
            if let Err(cleanup) = data.assets.delete(&stored.asset_id).await {
                error!(asset = %stored.asset_id, error = %cleanup, "orphaned asset after failed insert");
            }
            return Err(missing("Destination")(e));
        }
    };
    info!(photo = %photo.id, destination = %destination.id, "photo uploaded");
    Ok(HttpResponse::Created().json(json!({ "ok": true, "photo": photo })))
}

#[utoipa::path(
    get,
    path = "/photos/{destination_id}",
    params(("destination_id" = String, Path, description = "Parent destination")),
    responses(
        (status = 200, description = "Photos, newest first", body = [Photo]),
        (status = 404, description = "Destination not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_photos(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let destination = data.repo.get_destination(path.into_inner()).await.map_err(missing("Destination"))?;
    let photos = data.repo.list_photos(destination.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": photos.len(), "photos": photos })))
}

#[utoipa::path(
    delete,
    path = "/photos/{photo_id}",
    params(("photo_id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Stored binary and record deleted"),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Photo not found", body = ApiErrorBody),
        (status = 502, description = "Stored binary could not be removed; record kept", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_photo(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let photo = data.repo.get_photo(path.into_inner()).await.map_err(missing("Photo"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &photo, Relation::IsOwner).await?;
    purge_photos(&data, std::slice::from_ref(&photo)).await?;
    info!(photo = %photo.id, "photo deleted");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Photo deleted successfully" })))
}
