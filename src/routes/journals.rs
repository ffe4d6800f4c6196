use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use super::{missing, AppState};
use crate::auth::Auth;
use crate::authz::{authorize, Relation};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::{DestinationRepo, JournalRepo};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/all/{destination_id}", web::get().to(list_journals))
        .route("/update/{id}", web::patch().to(update_journal))
        .route("/{destination_id}", web::post().to(create_journal))
        .route("/{id}", web::get().to(get_journal))
        .route("/{id}", web::delete().to(delete_journal));
}

#[utoipa::path(
    post,
    path = "/journals/{destination_id}",
    params(("destination_id" = String, Path, description = "Parent destination")),
    request_body = NewJournal,
    responses(
        (status = 201, description = "Journal created", body = Journal),
        (status = 400, description = "Invalid payload", body = ApiErrorBody),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Destination not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_journal(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewJournal>,
) -> Result<HttpResponse, ApiError> {
    let destination = data.repo.get_destination(path.into_inner()).await.map_err(missing("Destination"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &destination, Relation::IsOwner).await?;
    let new = payload.into_inner();
    new.validate()?;
    let journal = data.repo.create_journal(destination.id, new).await?;
    info!(journal = %journal.id, destination = %destination.id, "journal created");
    Ok(HttpResponse::Created().json(json!({ "ok": true, "journal": journal })))
}

#[utoipa::path(
    get,
    path = "/journals/all/{destination_id}",
    params(("destination_id" = String, Path, description = "Parent destination")),
    responses(
        (status = 200, description = "Journals, newest first", body = [Journal]),
        (status = 404, description = "Destination not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_journals(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let destination = data.repo.get_destination(path.into_inner()).await.map_err(missing("Destination"))?;
    let journals = data.repo.list_journals(destination.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": journals.len(), "journals": journals })))
}

#[utoipa::path(
    get,
    path = "/journals/{id}",
    params(("id" = String, Path, description = "Journal id")),
    responses(
        (status = 200, description = "Journal", body = Journal),
        (status = 404, description = "Journal not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_journal(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let journal = data.repo.get_journal(path.into_inner()).await.map_err(missing("Journal"))?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "journal": journal })))
}

#[utoipa::path(
    patch,
    path = "/journals/update/{id}",
    params(("id" = String, Path, description = "Journal id")),
    request_body = UpdateJournal,
    responses(
        (status = 200, description = "Updated journal", body = Journal),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Journal not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_journal(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateJournal>,
) -> Result<HttpResponse, ApiError> {
    let journal = data.repo.get_journal(path.into_inner()).await.map_err(missing("Journal"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &journal, Relation::IsOwner).await?;
    let upd = payload.into_inner();
    upd.validate()?;
    let journal = data.repo.update_journal(journal.id, upd).await?;
    info!(journal = %journal.id, "journal updated");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "journal": journal })))
}

#[utoipa::path(
    delete,
    path = "/journals/{id}",
    params(("id" = String, Path, description = "Journal id")),
    responses(
        (status = 200, description = "Journal and its comments deleted"),
        (status = 403, description = "Caller does not own the trip", body = ApiErrorBody),
        (status = 404, description = "Journal not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_journal(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let journal = data.repo.get_journal(path.into_inner()).await.map_err(missing("Journal"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &journal, Relation::IsOwner).await?;
    data.repo.delete_journal(journal.id).await?;
    info!(journal = %journal.id, "journal deleted");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Journal deleted successfully" })))
}
