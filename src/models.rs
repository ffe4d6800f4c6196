use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub type Id = Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_COMMENT_LEN: usize = 500;
pub const SEARCH_LIMIT: usize = 5;

/// Rejected payload; the message is returned to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError(format!("{field} is required")));
    }
    Ok(())
}

fn require_opt(field: &str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn check_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError("endDate must not be before startDate".into()));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn check_comment_text(text: &str) -> Result<(), ValidationError> {
    let len = text.trim().chars().count();
    if len == 0 || text.chars().count() > MAX_COMMENT_LEN {
        return Err(ValidationError(format!(
            "text must be between 1 and {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------- accounts

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "account_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Id,
    pub email: Option<String>,
    pub name: String,
    pub surname: Option<String>,
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>, // absent for federated accounts
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Federated accounts without a backfilled secret cannot use password login.
    pub fn has_local_secret(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn matches_query(&self, needle_lower: &str) -> bool {
        let hit = |v: &str| v.to_lowercase().contains(needle_lower);
        hit(&self.name)
            || self.surname.as_deref().is_some_and(hit)
            || self.username.as_deref().is_some_and(hit)
    }
}

/// Public profile: the account plus follow edges seen from both sides.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountProfile {
    #[serde(flatten)]
    pub account: Account,
    pub following: Vec<Id>,
    pub followers: Vec<Id>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if [&self.name, &self.surname, &self.username, &self.password]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(ValidationError("All fields are required".into()));
        }
        check_password(&self.password)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl UpdateAccount {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_opt("name", self.name.as_deref())?;
        require_opt("surname", self.surname.as_deref())?;
        require_opt("username", self.username.as_deref())?;
        if let Some(p) = &self.password {
            check_password(p)?;
        }
        Ok(())
    }
}

/// Row to insert; built by the identity layer once the secret is hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Option<String>,
    pub name: String,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub provider: Provider,
}

/// Store-level patch; `password_hash` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

// ------------------------------------------------------------------- trips

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Id,
    pub owner_id: Id,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewTrip {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        check_date_range(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrip {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Trip {
    /// Overwrites only the fields present in `upd`.
    pub fn apply(&mut self, upd: &UpdateTrip) {
        if let Some(v) = &upd.title { self.title = v.clone(); }
        if let Some(v) = &upd.description { self.description = v.clone(); }
        if let Some(v) = upd.start_date { self.start_date = v; }
        if let Some(v) = upd.end_date { self.end_date = v; }
    }

    /// Validates `upd` against the record it would produce.
    pub fn check_update(&self, upd: &UpdateTrip) -> Result<(), ValidationError> {
        require_opt("title", upd.title.as_deref())?;
        require_opt("description", upd.description.as_deref())?;
        let mut merged = self.clone();
        merged.apply(upd);
        check_date_range(merged.start_date, merged.end_date)
    }
}

// ------------------------------------------------------------ destinations

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: Id,
    pub trip_id: Id,
    pub title: String,
    pub location: String,
    pub description: String,
    pub date_visited: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDestination {
    pub title: String,
    pub location: String,
    pub description: String,
    pub date_visited: NaiveDate,
}

impl NewDestination {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("location", &self.location)?;
        require("description", &self.description)?;
        check_description(&self.description)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDestination {
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub date_visited: Option<NaiveDate>,
}

impl UpdateDestination {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_opt("title", self.title.as_deref())?;
        require_opt("location", self.location.as_deref())?;
        if let Some(d) = &self.description {
            require("description", d)?;
            check_description(d)?;
        }
        Ok(())
    }
}

impl Destination {
    pub fn apply(&mut self, upd: &UpdateDestination) {
        if let Some(v) = &upd.title { self.title = v.clone(); }
        if let Some(v) = &upd.location { self.location = v.clone(); }
        if let Some(v) = &upd.description { self.description = v.clone(); }
        if let Some(v) = upd.date_visited { self.date_visited = v; }
    }
}

// ---------------------------------------------------------------- journals

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "journal_mood", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    #[default]
    Neutral,
    Sad,
    Excited,
    Relaxed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub id: Id,
    pub destination_id: Id,
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewJournal {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood: Mood,
}

impl NewJournal {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateJournal {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<Mood>,
}

impl UpdateJournal {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_opt("title", self.title.as_deref())?;
        require_opt("content", self.content.as_deref())
    }
}

impl Journal {
    pub fn apply(&mut self, upd: &UpdateJournal) {
        if let Some(v) = &upd.title { self.title = v.clone(); }
        if let Some(v) = &upd.content { self.content = v.clone(); }
        if let Some(v) = upd.mood { self.mood = v; }
    }
}

// ------------------------------------------------------------------ photos

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Id,
    pub destination_id: Id,
    pub url: String,
    pub caption: Option<String>,
    pub asset_id: String, // key in the asset store
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub destination_id: Id,
    pub url: String,
    pub caption: Option<String>,
    pub asset_id: String,
}

// ---------------------------------------------------------------- comments

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "comment_target")]
pub enum CommentTarget {
    Journal,
    Photo,
    Destination,
}

impl fmt::Display for CommentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommentTarget::Journal => "Journal",
            CommentTarget::Photo => "Photo",
            CommentTarget::Destination => "Destination",
        };
        f.write_str(s)
    }
}

impl FromStr for CommentTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Journal" => Ok(CommentTarget::Journal),
            "Photo" => Ok(CommentTarget::Photo),
            "Destination" => Ok(CommentTarget::Destination),
            other => Err(ValidationError(format!(
                "targetType must be one of Journal, Photo, Destination (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub author_id: Id,
    pub target_type: CommentTarget,
    pub target_id: Id,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
    pub target_type: CommentTarget,
    pub target_id: Id,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_comment_text(&self.text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateComment {
    pub text: Option<String>,
}

impl UpdateComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.text {
            Some(t) => check_comment_text(t),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trip() -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Alps".into(),
            description: "hiking".into(),
            start_date: date(2024, 6, 1),
            end_date: date(2024, 6, 10),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn signup_requires_every_field_and_long_password() {
        let mut req = SignupRequest {
            name: "Ana".into(),
            surname: "Lee".into(),
            username: "ana".into(),
            password: "short".into(),
        };
        assert!(req.validate().is_err());
        req.password = "longenough".into();
        assert!(req.validate().is_ok());
        req.surname = "  ".into();
        assert_eq!(req.validate().unwrap_err().0, "All fields are required");
    }

    #[test]
    fn trip_dates_must_be_ordered() {
        let new = NewTrip {
            title: "t".into(),
            description: "d".into(),
            start_date: date(2024, 5, 2),
            end_date: date(2024, 5, 1),
        };
        assert!(new.validate().is_err());

        let t = trip();
        let bad = UpdateTrip { end_date: Some(date(2024, 5, 1)), ..Default::default() };
        assert!(t.check_update(&bad).is_err());
        let ok = UpdateTrip { title: Some("New".into()), ..Default::default() };
        assert!(t.check_update(&ok).is_ok());
    }

    #[test]
    fn trip_apply_only_overwrites_present_fields() {
        let mut t = trip();
        let before = t.clone();
        t.apply(&UpdateTrip { description: Some("skiing".into()), ..Default::default() });
        assert_eq!(t.description, "skiing");
        assert_eq!(t.title, before.title);
        assert_eq!(t.start_date, before.start_date);
        assert_eq!(t.end_date, before.end_date);
    }

    #[test]
    fn destination_description_is_capped() {
        let new = NewDestination {
            title: "Louvre".into(),
            location: "Paris".into(),
            description: "x".repeat(MAX_DESCRIPTION_LEN + 1),
            date_visited: date(2024, 1, 1),
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn comment_text_bounds() {
        let target = Uuid::new_v4();
        let mk = |text: &str| NewComment { text: text.into(), target_type: CommentTarget::Photo, target_id: target };
        assert!(mk("").validate().is_err());
        assert!(mk("nice").validate().is_ok());
        assert!(mk(&"a".repeat(MAX_COMMENT_LEN + 1)).validate().is_err());
    }

    #[test]
    fn comment_target_parses_exact_names() {
        assert_eq!("Journal".parse::<CommentTarget>().unwrap(), CommentTarget::Journal);
        assert!("journal".parse::<CommentTarget>().is_err());
    }

    #[test]
    fn journal_mood_defaults_to_neutral() {
        let j: NewJournal = serde_json::from_str(r#"{"title":"Day 1","content":"rain"}"#).unwrap();
        assert_eq!(j.mood, Mood::Neutral);
    }

    #[test]
    fn account_hash_never_serialized() {
        let now = Utc::now();
        let a = Account {
            id: Uuid::new_v4(),
            email: None,
            name: "Ana".into(),
            surname: Some("Lee".into()),
            username: Some("ana".into()),
            password_hash: Some("$argon2id$secret".into()),
            provider: Provider::Local,
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&a).unwrap();
        assert!(v.get("passwordHash").is_none());
        assert_eq!(v["provider"], "local");
        assert!(a.matches_query("le"));
        assert!(!a.matches_query("zz"));
    }
}
