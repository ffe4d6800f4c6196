use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Id;
use crate::routes::AppState;

/// Bearer tokens stay valid for a week.
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Id,
    pub iat: usize,
    pub exp: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("cannot sign token: {0}")]
    Signing(String),
}

/// Issues and verifies HS256 bearer tokens carrying the account id.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, chrono::Duration::days(TOKEN_TTL_DAYS))
    }

    pub fn with_ttl(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, account_id: Id) -> Result<String, TokenError> {
        let now = chrono::Utc::now();
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("expiry out of range".into()))?;
        let claims = Claims {
            sub: account_id,
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        use jsonwebtoken::errors::ErrorKind;
        let mut validation = Validation::default(); // HS256
        validation.validate_exp = true;
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Argon2id hashing of account secrets into PHC strings.
#[derive(Clone)]
pub struct SecretHasher {
    params: Params,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self { params: Params::default() }
    }
}

impl SecretHasher {
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, secret: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        Ok(self.argon().hash_password(secret.as_bytes(), &salt)?.to_string())
    }

    /// Parameters are read back from the PHC string, not from `self`.
    pub fn verify(&self, secret: &str, phc: &str) -> bool {
        match PasswordHash::new(phc) {
            Ok(parsed) => self.argon().verify_password(secret.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

/// Extractor yielding the account a verified bearer token was issued for.
pub struct Auth(pub Id);

impl Auth {
    pub fn account_id(&self) -> Id {
        self.0
    }
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(ApiError::Internal("application state missing".into())));
        };
        // Delegate to BearerAuth to parse the header.
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ApiError::Auth("Authorization required".into())));
        };
        ready(state.identity.verify_token(bearer.token()).map(Auth).map_err(ApiError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &[u8] = b"test-secret-must-be-32-bytes-long!!";

    #[test]
    fn token_roundtrip_carries_account_id() {
        let svc = TokenService::new(SECRET);
        let id = Uuid::new_v4();
        let token = svc.issue(id).unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.exp - claims.iat, (TOKEN_TTL_DAYS * 24 * 3600) as usize);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let a = TokenService::new(SECRET);
        let b = TokenService::new(b"another-secret-that-is-32-bytes-long");
        let token = a.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(b.verify(&token), Err(TokenError::Invalid)));
        assert!(matches!(a.verify("garbage"), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = TokenService::with_ttl(SECRET, chrono::Duration::seconds(-10));
        let token = svc.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(svc.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn secret_hash_verifies_only_the_original() {
        let hasher = SecretHasher::with_params(Params::new(1024, 1, 1, None).unwrap());
        let phc = hasher.hash("correct horse").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &phc));
        assert!(!hasher.verify("wrong horse", &phc));
        assert!(!hasher.verify("correct horse", "not-a-phc-string"));
    }
}
