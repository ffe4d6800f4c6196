use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use super::{missing, purge_photos, sweep_cascaded, AppState};
use crate::auth::Auth;
use crate::authz::{authorize, Relation};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::{PhotoRepo, TripRepo};

pub fn config(cfg: &mut web::ServiceConfig) {
    // literal segments first so they never parse as an id
    cfg.route("/create", web::post().to(create_trip))
        .route("/allTrips", web::get().to(list_trips))
        .route("/update/{id}", web::patch().to(update_trip))
        .route("/delete/{id}", web::delete().to(delete_trip))
        .route("/{id}", web::get().to(get_trip));
}

#[utoipa::path(
    post,
    path = "/trips/create",
    request_body = NewTrip,
    responses(
        (status = 201, description = "Trip created", body = Trip),
        (status = 400, description = "Invalid payload", body = ApiErrorBody),
        (status = 401, description = "Unauthenticated", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_trip(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewTrip>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    new.validate()?;
    let trip = data.repo.create_trip(auth.account_id(), new).await?;
    info!(trip = %trip.id, owner = %trip.owner_id, "trip created");
    Ok(HttpResponse::Created().json(json!({ "ok": true, "trip": trip })))
}

#[utoipa::path(
    get,
    path = "/trips/allTrips",
    responses(
        (status = 200, description = "Caller's trips, newest first", body = [Trip]),
        (status = 401, description = "Unauthenticated", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_trips(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let trips = data.repo.list_trips(auth.account_id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": trips.len(), "trips": trips })))
}

#[utoipa::path(
    get,
    path = "/trips/{id}",
    params(("id" = String, Path, description = "Trip id")),
    responses(
        (status = 200, description = "Trip", body = Trip),
        (status = 404, description = "Trip not found", body = ApiErrorBody)
    )
)]
pub async fn get_trip(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let trip = load(&data, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "trip": trip })))
}

#[utoipa::path(
    patch,
    path = "/trips/update/{id}",
    params(("id" = String, Path, description = "Trip id")),
    request_body = UpdateTrip,
    responses(
        (status = 200, description = "Updated trip", body = Trip),
        (status = 400, description = "Invalid patch", body = ApiErrorBody),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "Trip not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_trip(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateTrip>,
) -> Result<HttpResponse, ApiError> {
    let trip = load(&data, path.into_inner()).await?;
    authorize(data.repo.as_ref(), auth.account_id(), &trip, Relation::IsOwner).await?;
    let upd = payload.into_inner();
    trip.check_update(&upd)?;
    let trip = data.repo.update_trip(trip.id, upd).await?;
    info!(trip = %trip.id, "trip updated");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "trip": trip })))
}

#[utoipa::path(
    delete,
    path = "/trips/delete/{id}",
    params(("id" = String, Path, description = "Trip id")),
    responses(
        (status = 200, description = "Trip and everything under it deleted"),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "Trip not found", body = ApiErrorBody),
        (status = 502, description = "Stored photos could not be removed", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_trip(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let trip = load(&data, path.into_inner()).await?;
    authorize(data.repo.as_ref(), auth.account_id(), &trip, Relation::IsOwner).await?;
    let photos = data.repo.list_trip_photos(trip.id).await?;
    purge_photos(&data, &photos).await?;
    let late = data.repo.delete_trip(trip.id).await?;
    sweep_cascaded(&data, &late).await;
    info!(trip = %trip.id, photos = photos.len(), "trip deleted");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Trip deleted successfully" })))
}

async fn load(data: &AppState, id: Id) -> Result<Trip, ApiError> {
    data.repo.get_trip(id).await.map_err(missing("Trip"))
}
