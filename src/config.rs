use std::time::Duration;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub const MIN_JWT_SECRET_LEN: usize = 32;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const RAPIDAPI_HOST: &str = "travel-advisor.p.rapidapi.com";

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

#[derive(Clone, Debug)]
pub struct HotelApiConfig {
    /// Absent key disables the proxy (503).
    pub api_key: Option<String>,
    pub host: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base used to build public photo URLs; defaults to `{endpoint}/{bucket}`.
    pub public_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub frontend_url: String,
    pub google: Option<GoogleConfig>,
    pub hotels: HotelApiConfig,
    pub s3: S3Config,
    pub auth_rl_limit: usize,
    pub auth_rl_window: Duration,
    pub enable_hsts: bool,
    /// Served as `Content-Security-Policy` when set.
    pub content_security_policy: Option<String>,
    /// Key the auth limiter on `X-Forwarded-For` instead of the socket peer.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} characters long"),
            });
        }

        let database_url = var("DATABASE_URL");
        if cfg!(feature = "postgres-store") && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET"), var("GOOGLE_REDIRECT_URI")) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri,
                auth_url: var("GOOGLE_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.into()),
                token_url: var("GOOGLE_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.into()),
                userinfo_url: var("GOOGLE_USERINFO_URL").unwrap_or_else(|| GOOGLE_USERINFO_URL.into()),
            }),
            _ => None,
        };

        let host = var("RAPIDAPI_HOST").unwrap_or_else(|| RAPIDAPI_HOST.into());
        let hotels = HotelApiConfig {
            api_key: var("RAPIDAPI_KEY"),
            base_url: var("HOTEL_API_BASE").unwrap_or_else(|| format!("https://{host}")),
            host,
        };

        let endpoint = var("S3_ENDPOINT").ok_or(ConfigError::Missing("S3_ENDPOINT"))?;
        let bucket = var("S3_BUCKET").unwrap_or_else(|| "wanderlog".into());
        let s3 = S3Config {
            public_url: var("S3_PUBLIC_URL")
                .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket)),
            region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            access_key: var("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: var("S3_SECRET_KEY").unwrap_or_default(),
            endpoint,
            bucket,
        };

        Ok(Self {
            port: parse_or(&var, "APP_PORT", 4000)?,
            jwt_secret,
            database_url,
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".into()),
            google,
            hotels,
            s3,
            auth_rl_limit: parse_or(&var, "AUTH_RL_LIMIT", 100)?,
            auth_rl_window: Duration::from_secs(parse_or(&var, "AUTH_RL_WINDOW_SECS", 900)?),
            enable_hsts: flag(&var, "ENABLE_HSTS"),
            content_security_policy: var("CONTENT_SECURITY_POLICY"),
            trust_proxy: flag(&var, "TRUST_PROXY"),
        })
    }
}

fn flag<F>(var: &F, name: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
    }
}
