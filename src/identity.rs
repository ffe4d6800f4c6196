use std::sync::Arc;

use actix_web::web;
use tracing::{info, warn};

use crate::auth::{SecretHasher, TokenError, TokenService};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::{AccountRepo, FollowRepo, Repo, RepoError};

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),
    #[error("Username already exists")]
    Conflict,
    #[error("{0}")]
    Auth(String),
    #[error("Only the account holder can change this account")]
    Forbidden,
    #[error("User not found")]
    NotFound,
    #[error("{0}")]
    Internal(String),
}

impl From<ValidationError> for IdentityError {
    fn from(e: ValidationError) -> Self {
        IdentityError::Validation(e.0)
    }
}

impl From<RepoError> for IdentityError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => IdentityError::NotFound,
            RepoError::Conflict => IdentityError::Conflict,
            RepoError::Internal(msg) => IdentityError::Internal(msg),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Validation(m) => ApiError::Validation(m),
            IdentityError::Conflict => ApiError::Conflict(e.to_string()),
            IdentityError::Auth(m) => ApiError::Auth(m),
            IdentityError::Forbidden => ApiError::Forbidden(e.to_string()),
            IdentityError::NotFound => ApiError::NotFound(e.to_string()),
            IdentityError::Internal(m) => ApiError::Internal(m),
        }
    }
}

/// Credentials, tokens and account lifecycle.
#[derive(Clone)]
pub struct Identity {
    repo: Arc<dyn Repo>,
    hasher: SecretHasher,
    tokens: TokenService,
}

impl Identity {
    pub fn new(repo: Arc<dyn Repo>, hasher: SecretHasher, tokens: TokenService) -> Self {
        Self { repo, hasher, tokens }
    }

    async fn hash(&self, secret: String) -> Result<String, IdentityError> {
        let hasher = self.hasher.clone();
        web::block(move || hasher.hash(&secret))
            .await
            .map_err(|e| IdentityError::Internal(e.to_string()))?
            .map_err(|e| IdentityError::Internal(e.to_string()))
    }

    async fn verify(&self, secret: String, phc: String) -> Result<bool, IdentityError> {
        let hasher = self.hasher.clone();
        web::block(move || hasher.verify(&secret, &phc))
            .await
            .map_err(|e| IdentityError::Internal(e.to_string()))
    }

    pub fn issue_token(&self, account_id: Id) -> Result<String, IdentityError> {
        self.tokens.issue(account_id).map_err(|e| IdentityError::Internal(e.to_string()))
    }

    /// Resolves a bearer token to the account it was issued for.
    pub fn verify_token(&self, token: &str) -> Result<Id, IdentityError> {
        match self.tokens.verify(token) {
            Ok(claims) => Ok(claims.sub),
            Err(TokenError::Expired) => Err(IdentityError::Auth("Token expired".into())),
            Err(_) => Err(IdentityError::Auth("Invalid token".into())),
        }
    }

    /// Creates a local account and returns its id.
    pub async fn register(&self, req: SignupRequest) -> Result<Id, IdentityError> {
        req.validate()?;
        // cheap early exit; the store's uniqueness check is what actually decides
        if self.repo.find_account_by_username(&req.username).await?.is_some() {
            return Err(IdentityError::Conflict);
        }
        let password_hash = self.hash(req.password).await?;
        let account = self
            .repo
            .create_account(NewAccount {
                email: None,
                name: req.name,
                surname: Some(req.surname),
                username: Some(req.username),
                password_hash: Some(password_hash),
                provider: Provider::Local,
            })
            .await?;
        info!(account = %account.id, "account registered");
        Ok(account.id)
    }

    /// Checks a username/password pair and issues a bearer token.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(String, Account), IdentityError> {
        if username.is_empty() || password.is_empty() {
            return Err(IdentityError::Auth("Password and Username are required".into()));
        }
        let Some(account) = self.repo.find_account_by_username(username).await? else {
            return Err(login_failure("User is not found"));
        };
        let Some(phc) = account.password_hash.clone() else {
            return Err(login_failure("Use Google login for this account"));
        };
        if !self.verify(password.to_string(), phc).await? {
            return Err(login_failure("Invalid credentials"));
        }
        let token = self.issue_token(account.id)?;
        Ok((token, account))
    }

    /// Returns the account registered under `email`, creating a federated one
    /// on first sight. Safe to call repeatedly and concurrently.
    pub async fn link_or_create_federated(
        &self,
        email: &str,
        display_name: &str,
        provider: Provider,
    ) -> Result<Account, IdentityError> {
        if email.trim().is_empty() {
            return Err(IdentityError::Validation("email is required".into()));
        }
        if let Some(existing) = self.repo.find_account_by_email(email).await? {
            return Ok(existing);
        }
        let created = self
            .repo
            .create_account(NewAccount {
                email: Some(email.to_string()),
                name: display_name.to_string(),
                surname: None,
                username: None,
                password_hash: None,
                provider,
            })
            .await;
        match created {
            Ok(account) => {
                info!(account = %account.id, provider = provider.as_str(), "federated account created");
                Ok(account)
            }
            // lost a race against another first login for the same email
            Err(RepoError::Conflict) => self.repo.find_account_by_email(email).await?.ok_or(IdentityError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn profile(&self, id: Id) -> Result<AccountProfile, IdentityError> {
        let account = self.repo.get_account(id).await?;
        let following = self.repo.list_following(id).await?;
        let followers = self.repo.list_followers(id).await?;
        Ok(AccountProfile { account, following, followers })
    }

    /// Partial update of the caller's own account; also how federated
    /// accounts backfill a handle and password.
    pub async fn update_account(&self, actor: Id, id: Id, upd: UpdateAccount) -> Result<Account, IdentityError> {
        if actor != id {
            return Err(IdentityError::Forbidden);
        }
        upd.validate()?;
        let password_hash = match upd.password {
            Some(p) => Some(self.hash(p).await?),
            None => None,
        };
        let patch = AccountPatch { name: upd.name, surname: upd.surname, username: upd.username, password_hash };
        Ok(self.repo.update_account(id, patch).await?)
    }

    /// People search: at most [`SEARCH_LIMIT`] accounts.
    pub async fn search(&self, query: &str) -> Result<Vec<Account>, IdentityError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(IdentityError::Validation("Query parameter required".into()));
        }
        Ok(self.repo.search_accounts(query, SEARCH_LIMIT).await?)
    }
}

fn login_failure(reason: &str) -> IdentityError {
    metrics::increment_counter!("wanderlog_login_failures_total");
    warn!(reason, "login rejected");
    IdentityError::Auth(reason.to_string())
}
