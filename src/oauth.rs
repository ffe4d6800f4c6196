//! Google authorization-code flow: build the consent redirect, then trade the
//! returned code for the user's email and name.

use serde::Deserialize;

use crate::config::GoogleConfig;

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("identity provider rejected the {stage} request ({status})")]
    Rejected { stage: &'static str, status: u16 },
    #[error("identity provider sent an unreadable {stage} response: {reason}")]
    Decode { stage: &'static str, reason: String },
    #[error("identity provider returned no email")]
    NoEmail,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuth {
    cfg: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(cfg: GoogleConfig) -> Self {
        Self { cfg, client: reqwest::Client::new() }
    }

    pub fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}",
            self.cfg.auth_url,
            urlencoding::encode(&self.cfg.client_id),
            urlencoding::encode(&self.cfg.redirect_uri),
            urlencoding::encode("openid email profile"),
        )
    }

    /// Returns `(email, display_name)` for the account that granted `code`.
    pub async fn exchange(&self, code: &str) -> Result<(String, String), OAuthError> {
        let token: TokenResponse = self
            .read_json(
                "token",
                self.client.post(&self.cfg.token_url).form(&[
                    ("client_id", self.cfg.client_id.as_str()),
                    ("client_secret", self.cfg.client_secret.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.cfg.redirect_uri.as_str()),
                ]),
            )
            .await?;

        let user: GoogleUser = self
            .read_json("userinfo", self.client.get(&self.cfg.userinfo_url).bearer_auth(&token.access_token))
            .await?;

        let email = user.email.filter(|e| !e.is_empty()).ok_or(OAuthError::NoEmail)?;
        let name = user.name.filter(|n| !n.is_empty()).unwrap_or_else(|| email.clone());
        Ok((email, name))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        stage: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, OAuthError> {
        let resp = req.send().await.map_err(|e| OAuthError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OAuthError::Rejected { stage, status: resp.status().as_u16() });
        }
        resp.json::<T>().await.map_err(|e| OAuthError::Decode { stage, reason: e.to_string() })
    }
}
