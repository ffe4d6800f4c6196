use std::sync::Arc;

use actix_web::{web, HttpResponse};
use futures_util::future::join_all;
use serde_json::json;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::hotels::HotelSearch;
use crate::identity::Identity;
use crate::models::Photo;
use crate::oauth::GoogleOAuth;
use crate::rate_limit::{AuthRateLimit, RateLimiterFacade};
use crate::repo::{PhotoRepo, Repo, RepoError};
use crate::storage::AssetStore;

pub mod auth;
pub mod comments;
pub mod destinations;
pub mod follow;
pub mod hotels;
pub mod journals;
pub mod photos;
pub mod trips;

/// Everything a handler may touch. Built once in `main` and shared by all workers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub identity: Identity,
    pub assets: Arc<dyn AssetStore>,
    /// `None` when no hotel API key is configured.
    pub hotels: Option<Arc<dyn HotelSearch>>,
    /// `None` when Google login is not configured.
    pub google: Option<GoogleOAuth>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, identity: Identity, assets: Arc<dyn AssetStore>) -> Self {
        Self { repo, identity, assets, hotels: None, google: None, rate_limiter: None }
    }

    pub fn with_hotels(mut self, hotels: Arc<dyn HotelSearch>) -> Self {
        self.hotels = Some(hotels);
        self
    }

    pub fn with_google(mut self, google: GoogleOAuth) -> Self {
        self.google = Some(google);
        self
    }

    pub fn with_rate_limiter(mut self, rl: RateLimiterFacade) -> Self {
        self.rate_limiter = Some(rl);
        self
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed bodies, ids and query strings share the error envelope
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| ApiError::Validation(err.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|err, _| ApiError::Validation(err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _| ApiError::Validation(err.to_string()).into()));

    cfg.service(web::scope("/auth").wrap(AuthRateLimit).configure(auth::config))
        .service(web::scope("/trips").configure(trips::config))
        .service(web::scope("/destinations").configure(destinations::config))
        .service(web::scope("/journals").configure(journals::config))
        .service(web::scope("/photos").configure(photos::config))
        .service(web::scope("/comments").configure(comments::config))
        .service(web::scope("/api").configure(hotels::config))
        .configure(follow::config)
        .route("/health", web::get().to(health))
        .default_service(web::to(not_found));
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Process is up")))]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Route not found".into()))
}

/// Deletes each photo's stored binary, then its record. Every photo is tried;
/// one whose binary survives keeps its record, and the first such failure is
/// returned. A record never outlives its binary.
pub(crate) async fn purge_photos(state: &AppState, photos: &[Photo]) -> Result<(), ApiError> {
    let outcomes = join_all(photos.iter().map(|p| purge_photo(state, p))).await;
    outcomes.into_iter().collect::<Result<Vec<()>, ApiError>>()?;
    Ok(())
}

async fn purge_photo(state: &AppState, photo: &Photo) -> Result<(), ApiError> {
    state.assets.delete(&photo.asset_id).await?;
    match state.repo.delete_photo(photo.id).await {
        Ok(()) | Err(RepoError::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Drops binaries of photos a cascade removed after [`purge_photos`] ran,
/// i.e. uploads that landed in between. Their records are already gone, so
/// a failure here can only be logged.
pub(crate) async fn sweep_cascaded(state: &AppState, removed: &[Photo]) {
    let outcomes = join_all(removed.iter().map(|p| state.assets.delete(&p.asset_id))).await;
    for (photo, outcome) in removed.iter().zip(outcomes) {
        match outcome {
            Ok(()) => warn!(photo = %photo.id, "removed binary of a photo uploaded during a cascade delete"),
            Err(e) => error!(asset = %photo.asset_id, error = %e, "orphaned asset after cascade delete"),
        }
    }
}

/// Names the missing record instead of the generic store message.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(RepoError) -> ApiError {
    move |e| match e {
        RepoError::NotFound => ApiError::not_found(what),
        other => other.into(),
    }
}
