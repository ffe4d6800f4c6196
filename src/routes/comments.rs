use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use super::{missing, AppState};
use crate::auth::Auth;
use crate::authz::{authorize, Relation};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::CommentRepo;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_comment))
        .route("/", web::post().to(create_comment))
        .route("/update/{id}", web::patch().to(update_comment))
        .route("/{target_type}/{target_id}", web::get().to(list_comments))
        .route("/{id}", web::delete().to(delete_comment));
}

#[utoipa::path(
    post,
    path = "/comments",
    request_body = NewComment,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Invalid payload", body = ApiErrorBody),
        (status = 404, description = "Commented resource not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    new.validate()?;
    let target = new.target_type;
    let comment = data
        .repo
        .create_comment(auth.account_id(), new)
        .await
        .map_err(missing("Comment target"))?;
    info!(comment = %comment.id, %target, target_id = %comment.target_id, "comment created");
    Ok(HttpResponse::Created().json(json!({ "ok": true, "comment": comment })))
}

#[utoipa::path(
    get,
    path = "/comments/{target_type}/{target_id}",
    params(
        ("target_type" = String, Path, description = "Journal, Photo or Destination"),
        ("target_id" = String, Path, description = "Commented resource")
    ),
    responses(
        (status = 200, description = "Comments, newest first", body = [Comment]),
        (status = 400, description = "Unknown target type", body = ApiErrorBody)
    )
)]
pub async fn list_comments(
    data: web::Data<AppState>,
    path: web::Path<(String, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (target_type, target_id) = path.into_inner();
    let target_type: CommentTarget = target_type.parse()?;
    let comments = data.repo.list_comments(target_type, target_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": comments.len(), "comments": comments })))
}

#[utoipa::path(
    patch,
    path = "/comments/update/{id}",
    params(("id" = String, Path, description = "Comment id")),
    request_body = UpdateComment,
    responses(
        (status = 200, description = "Updated comment", body = Comment),
        (status = 403, description = "Caller is not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateComment>,
) -> Result<HttpResponse, ApiError> {
    let comment = data.repo.get_comment(path.into_inner()).await.map_err(missing("Comment"))?;
    authorize(data.repo.as_ref(), auth.account_id(), &comment, Relation::IsAuthor).await?;
    let upd = payload.into_inner();
    upd.validate()?;
    let comment = data.repo.update_comment(comment.id, upd).await?;
    info!(comment = %comment.id, "comment updated");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "comment": comment })))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 403, description = "Caller is not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comment = data.repo.get_comment(path.into_inner()).await.map_err(missing("Comment"))?;
    // authorship only; owning the commented resource grants nothing here
    authorize(data.repo.as_ref(), auth.account_id(), &comment, Relation::IsAuthor).await?;
    data.repo.delete_comment(comment.id).await?;
    info!(comment = %comment.id, "comment deleted");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "message": "Comment deleted successfully" })))
}
