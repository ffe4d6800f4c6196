use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use super::{missing, purge_photos, sweep_cascaded, AppState};
use crate::auth::Auth;
use crate::authz::{authorize, Relation};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::{DestinationRepo, PhotoRepo, TripRepo};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/create/{trip_id}", web::post().to(create_destination))
        .route("/all/{trip_id}", web::get().to(list_destinations))
        .route("/update/{id}", web::patch().to(update_destination))
        .route("/{id}", web::get().to(get_destination))
        .route("/{id}", web::delete().to(delete_destination));
}

#[utoipa::path(
    post,
    path = "/destinations/create/{trip_id}",
    params(("trip_id" = String, Path, description = "Parent trip")),
    request_body = NewDestination,
    responses(
        (status = 201, description = "Destination created", body = Destination),
        (status = 400, description = "Invalid payload", body = ApiErrorBody),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Trip not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_destination(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewDestination>,
) -> Result<HttpResponse, ApiError> {
    let trip = data.repo.get_trip(path.into_inner()).await.map_err(missing("Trip"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &trip, Relation::IsOwner).await?;
    let new = payload.into_inner();
    new.validate()?;
    let destination = data.repo.create_destination(trip.id, new).await?;
    info!(destination = %destination.id, trip = %trip.id, "destination created");
    Ok(HttpResponse::Created().json(json!({ "ok": true, "destination": destination })))
}

#[utoipa::path(
    get,
    path = "/destinations/all/{trip_id}",
    params(("trip_id" = String, Path, description = "Parent trip")),
    responses(
        (status = 200, description = "Destinations of the trip, newest first", body = [Destination]),
        (status = 404, description = "Trip not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_destinations(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let trip = data.repo.get_trip(path.into_inner()).await.map_err(missing("Trip"))?;
    let destinations = data.repo.list_destinations(trip.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": destinations.len(), "destinations": destinations })))
}

#[utoipa::path(
    get,
    path = "/destinations/{id}",
    params(("id" = String, Path, description = "Destination id")),
    responses(
        (status = 200, description = "Destination", body = Destination),
        (status = 404, description = "Destination not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_destination(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let destination = load(&data, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "destination": destination })))
}

#[utoipa::path(
    patch,
    path = "/destinations/update/{id}",
    params(("id" = String, Path, description = "Destination id")),
    request_body = UpdateDestination,
    responses(
        (status = 200, description = "Updated destination", body = Destination),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Destination not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_destination(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDestination>,
) -> Result<HttpResponse, ApiError> {
    let destination = load(&data, path.into_inner()).await?;
    authorize(data.repo.as_ref(), auth.account_id(), &destination, Relation::IsOwner).await?;
    let upd = payload.into_inner();
    upd.validate()?;
    let destination = data.repo.update_destination(destination.id, upd).await?;
    info!(destination = %destination.id, "destination updated");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "destination": destination })))
}

#[utoipa::path(
    delete,
    path = "/destinations/{id}",
    params(("id" = String, Path, description = "Destination id")),
    responses(
        (status = 200, description = "Destination, its journals and photos deleted"),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Destination not found", body = ApiErrorBody),
        (status = 502, description = "Stored photos could not be removed", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_destination(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let destination = load(&data, path.into_inner()).await?;
    authorize(data.repo.as_ref(), auth.account_id(), &destination, Relation::IsOwner).await?;
    let photos = data.repo.list_photos(destination.id).await?;
    purge_photos(&data, &photos).await?;
    let late = data.repo.delete_destination(destination.id).await?;
    sweep_cascaded(&data, &late).await;
    info!(destination = %destination.id, photos = photos.len(), "destination deleted");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Destination deleted successfully" })))
}

async fn load(data: &AppState, id: Id) -> Result<Destination, ApiError> {
    data.repo.get_destination(id).await.map_err(missing("Destination"))
}
