use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::AppState;
use crate::auth::Auth;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/signup", web::post().to(signup))
        .route("/login", web::post().to(login))
        .route("/search-users", web::get().to(search_users))
        .route("/google", web::get().to(google_login))
        .route("/google/callback", web::get().to(google_callback))
        .route("/user/{id}", web::get().to(get_user))
        .route("/update/{id}", web::patch().to(update_user));
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created; body carries `_id`"),
        (status = 400, description = "Missing field or short password", body = ApiErrorBody),
        (status = 409, description = "Username already exists", body = ApiErrorBody),
        (status = 429, description = "Too many requests", body = ApiErrorBody)
    )
)]
pub async fn signup(data: web::Data<AppState>, payload: web::Json<SignupRequest>) -> Result<HttpResponse, ApiError> {
    let id = data.identity.register(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "ok": true, "_id": id })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token and account"),
        (status = 401, description = "Bad credentials", body = ApiErrorBody)
    )
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let (token, user) = data.identity.authenticate(&payload.username, &payload.password).await?;
    tracing::info!(account = %user.id, "login");
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "token": token, "user": user })))
}

#[utoipa::path(
    get,
    path = "/auth/user/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Public profile", body = AccountProfile),
        (status = 404, description = "User not found", body = ApiErrorBody)
    )
)]
pub async fn get_user(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let profile = data.identity.profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "user": profile })))
}

#[utoipa::path(
    patch,
    path = "/auth/update/{id}",
    params(("id" = String, Path, description = "Account id; must be the caller")),
    request_body = UpdateAccount,
    responses(
        (status = 200, description = "Updated account", body = Account),
        (status = 403, description = "Not the account holder", body = ApiErrorBody),
        (status = 409, description = "Username already exists", body = ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateAccount>,
) -> Result<HttpResponse, ApiError> {
    let user = data
        .identity
        .update_account(auth.account_id(), path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "user": user })))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[utoipa::path(
    get,
    path = "/auth/search-users",
    params(SearchQuery),
    responses(
        (status = 200, description = "At most five matching accounts", body = [Account]),
        (status = 400, description = "Empty query", body = ApiErrorBody)
    )
)]
pub async fn search_users(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse, ApiError> {
    let users = data.identity.search(&query.q).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "users": users })))
}

#[utoipa::path(
    get,
    path = "/auth/google",
    responses(
        (status = 302, description = "Redirect to the Google consent screen"),
        (status = 503, description = "Google login not configured", body = ApiErrorBody)
    )
)]
pub async fn google_login(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let google = data.google.as_ref().ok_or_else(google_unconfigured)?;
    Ok(HttpResponse::Found().insert_header(("Location", google.authorize_url())).finish())
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoogleCallback {
    code: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(GoogleCallback),
    responses(
        (status = 200, description = "Bearer token and the linked account"),
        (status = 400, description = "Missing code", body = ApiErrorBody),
        (status = 502, description = "Provider failure", body = ApiErrorBody)
    )
)]
pub async fn google_callback(
    data: web::Data<AppState>,
    query: web::Query<GoogleCallback>,
) -> Result<HttpResponse, ApiError> {
    let google = data.google.as_ref().ok_or_else(google_unconfigured)?;
    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("code is required".into()))?;
    let (email, name) = google.exchange(code).await?;
    let user = data.identity.link_or_create_federated(&email, &name, Provider::Google).await?;
    let token = data.identity.issue_token(user.id)?;
    tracing::info!(account = %user.id, "google login");
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "message": "Google login successful",
        "token": token,
        "user": user,
    })))
}

fn google_unconfigured() -> ApiError {
    ApiError::Unavailable("Google login is not configured".into())
}
