use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::AppState;
use crate::error::{ApiError, ApiErrorBody};
use crate::hotels::Hotel;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/hotels", web::get().to(search_hotels));
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HotelQuery {
    city: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/hotels",
    params(HotelQuery),
    responses(
        (status = 200, description = "Lodging results for the city", body = [Hotel]),
        (status = 400, description = "City is required", body = ApiErrorBody),
        (status = 502, description = "Upstream failure", body = ApiErrorBody),
        (status = 503, description = "Hotel search not configured", body = ApiErrorBody)
    )
)]
pub async fn search_hotels(data: web::Data<AppState>, query: web::Query<HotelQuery>) -> Result<HttpResponse, ApiError> {
    let city = query
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Validation("City is required".into()))?;
    let search = data
        .hotels
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Hotel search is not configured".into()))?;
    let hotels = search.search(city).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "hotels": hotels })))
}
