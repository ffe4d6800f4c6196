use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::HotelApiConfig;
use crate::retry::RetryPolicy;

pub const NO_ADDRESS: &str = "No address available";
pub const NO_RATING: &str = "N/A";
pub const PLACEHOLDER_PHOTO: &str = "https://via.placeholder.com/400x200?text=Hotel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub name: String,
    pub address: String,
    pub rating: String,
    pub photo_url: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(thiserror::Error, Debug)]
pub enum HotelSearchError {
    #[error("hotel search unreachable: {0}")]
    Transport(String),
    #[error("hotel search answered {status}")]
    Status { status: u16 },
    #[error("hotel search sent an unreadable body: {0}")]
    Decode(String),
}

impl HotelSearchError {
    fn is_transient(&self) -> bool {
        match self {
            HotelSearchError::Transport(_) => true,
            HotelSearchError::Status { status } => *status == 429 || *status >= 500,
            HotelSearchError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait HotelSearch: Send + Sync {
    async fn search(&self, city: &str) -> Result<Vec<Hotel>, HotelSearchError>;
}

/// Travel Advisor location search through RapidAPI.
pub struct RapidApiHotels {
    client: reqwest::Client,
    base_url: String,
    host: String,
    api_key: String,
    retry: RetryPolicy,
}

impl RapidApiHotels {
    pub fn new(base_url: impl Into<String>, host: impl Into<String>, api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            host: host.into(),
            api_key: api_key.into(),
            retry,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(cfg: &HotelApiConfig, retry: RetryPolicy) -> Option<Self> {
        let key = cfg.api_key.as_ref()?;
        Some(Self::new(cfg.base_url.clone(), cfg.host.clone(), key.clone(), retry))
    }

    async fn fetch(&self, city: &str) -> Result<Value, HotelSearchError> {
        let resp = self
            .client
            .get(format!("{}/locations/search", self.base_url))
            .query(&[("query", city)])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await
            .map_err(|e| HotelSearchError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HotelSearchError::Status { status: status.as_u16() });
        }
        resp.json::<Value>().await.map_err(|e| HotelSearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl HotelSearch for RapidApiHotels {
    async fn search(&self, city: &str) -> Result<Vec<Hotel>, HotelSearchError> {
        let body = self
            .retry
            .run("hotel_search", move || self.fetch(city), HotelSearchError::is_transient)
            .await?;
        Ok(lodgings(&body))
    }
}

/// Keeps the `lodging` results of a location-search body, filling gaps with
/// display defaults.
pub fn lodgings(body: &Value) -> Vec<Hotel> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.get("result_type").and_then(Value::as_str) == Some("lodging"))
        .map(|item| {
            let obj = item.get("result_object").unwrap_or(&Value::Null);
            Hotel {
                name: text(obj.get("name")).unwrap_or_default(),
                address: text(obj.get("address")).unwrap_or_else(|| NO_ADDRESS.into()),
                rating: text(obj.get("rating")).unwrap_or_else(|| NO_RATING.into()),
                photo_url: text(obj.pointer("/photo/images/large/url")).unwrap_or_else(|| PLACEHOLDER_PHOTO.into()),
                lat: number(obj.get("latitude")),
                lng: number(obj.get("longitude")),
            }
        })
        .collect()
}

// upstream mixes strings and numbers for the same fields
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_lodging_and_fills_defaults() {
        let body = json!({ "data": [
            { "result_type": "lodging", "result_object": {
                "name": "Hotel Roma", "address": "Via 1", "rating": "4.5",
                "latitude": "41.9", "longitude": 12.5,
                "photo": { "images": { "large": { "url": "http://img/roma.jpg" } } }
            }},
            { "result_type": "restaurants", "result_object": { "name": "Trattoria" } },
            { "result_type": "lodging", "result_object": { "name": "Bare Inn", "address": "" } }
        ]});
        let hotels = lodgings(&body);
        assert_eq!(hotels.len(), 2);
        assert_eq!(hotels[0].photo_url, "http://img/roma.jpg");
        assert_eq!(hotels[0].lat, Some(41.9));
        assert_eq!(hotels[0].lng, Some(12.5));
        assert_eq!(hotels[1].address, NO_ADDRESS);
        assert_eq!(hotels[1].rating, NO_RATING);
        assert_eq!(hotels[1].photo_url, PLACEHOLDER_PHOTO);
        assert_eq!(hotels[1].lat, None);
    }

    #[test]
    fn missing_data_yields_no_hotels() {
        assert!(lodgings(&json!({ "errors": ["quota"] })).is_empty());
    }

    #[test]
    fn serializes_photo_url_in_camel_case() {
        let h = lodgings(&json!({ "data": [{ "result_type": "lodging", "result_object": { "name": "X" } }] }));
        let v = serde_json::to_value(&h[0]).unwrap();
        assert!(v.get("photoUrl").is_some());
    }
}
