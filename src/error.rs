use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::AuthzError;
use crate::hotels::HotelSearchError;
use crate::models::ValidationError;
use crate::oauth::OAuthError;
use crate::repo::RepoError;
use crate::storage::AssetStoreError;

/// Error envelope returned by every failing route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] Validation(String),
    #[error("{0}")] Conflict(String),
    #[error("{0}")] Auth(String),
    #[error("{0}")] Forbidden(String),
    #[error("{0}")] NotFound(String),
    #[error("{0}")] Upstream(String),
    #[error("{0}")] Unavailable(String),
    #[error("Too many requests, please try again later")] RateLimited,
    #[error("internal error: {0}")] Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    fn public_message(&self) -> String {
        match self {
            // details stay in the logs for release builds
            ApiError::Internal(_) if !cfg!(debug_assertions) => "internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("resource not found".into()),
            RepoError::Conflict => ApiError::Conflict("resource already exists".into()),
            RepoError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.0)
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::Missing { kind, id } => ApiError::NotFound(format!("{kind} {id} not found")),
            AuthzError::Forbidden { .. } | AuthzError::NotApplicable { .. } => {
                ApiError::Forbidden("Not authorized to modify this resource".into())
            }
            AuthzError::Store(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<AssetStoreError> for ApiError {
    fn from(e: AssetStoreError) -> Self {
        tracing::error!(error = %e, "asset store call failed");
        ApiError::Upstream("Photo storage is unavailable".into())
    }
}

impl From<HotelSearchError> for ApiError {
    fn from(e: HotelSearchError) -> Self {
        tracing::error!(error = %e, "hotel search failed");
        ApiError::Upstream("Failed to fetch hotels".into())
    }
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        tracing::warn!(error = %e, "federated login failed");
        ApiError::Upstream("Google login failed".into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(detail) = self {
            tracing::error!(%detail, "request failed");
        }
        HttpResponse::build(self.status_code()).json(ApiErrorBody { message: self.public_message() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::Validation("x".into()).status_code(), 400);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ApiError::Auth("x".into()).status_code(), 401);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(ApiError::from(RepoError::NotFound).status_code(), 404);
        assert_eq!(ApiError::Upstream("x".into()).status_code(), 502);
        assert_eq!(ApiError::RateLimited.status_code(), 429);
    }
}
