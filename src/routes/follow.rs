use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use super::{missing, AppState};
use crate::auth::Auth;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::repo::{AccountRepo, FollowRepo};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/follow/{id}", web::post().to(follow))
        .route("/unfollow/{id}", web::post().to(unfollow));
}

fn handle(account: &Account) -> &str {
    account.username.as_deref().unwrap_or(&account.name)
}

#[utoipa::path(
    post,
    path = "/follow/{id}",
    params(("id" = String, Path, description = "Account to follow")),
    responses(
        (status = 200, description = "Following; repeating the call changes nothing"),
        (status = 400, description = "Cannot follow yourself", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let target_id = path.into_inner();
    if target_id == auth.account_id() {
        return Err(ApiError::Validation("You cannot follow yourself".into()));
    }
    let target = data.repo.get_account(target_id).await.map_err(missing("User"))?;
    let created = data.repo.follow(auth.account_id(), target.id).await.map_err(missing("User"))?;
    if created {
        info!(follower = %auth.account_id(), followee = %target.id, "follow");
    }
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "message": format!("You are now following {}", handle(&target)),
    })))
}

#[utoipa::path(
    post,
    path = "/unfollow/{id}",
    params(("id" = String, Path, description = "Account to unfollow")),
    responses(
        (status = 200, description = "Not following; repeating the call changes nothing"),
        (status = 404, description = "User not found", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unfollow(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let target = data.repo.get_account(path.into_inner()).await.map_err(missing("User"))?;
    let removed = data.repo.unfollow(auth.account_id(), target.id).await?;
    if removed {
        info!(follower = %auth.account_id(), followee = %target.id, "unfollow");
    }
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "message": format!("You unfollowed {}", handle(&target)),
    })))
}
