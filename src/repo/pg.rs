use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::*;

const ACCOUNT_COLS: &str = "id, email, name, surname, username, password_hash, provider, created_at, updated_at";
const TRIP_COLS: &str = "id, owner_id, title, description, start_date, end_date, created_at, updated_at";
const DEST_COLS: &str = "id, trip_id, title, location, description, date_visited, created_at, updated_at";
const JOURNAL_COLS: &str = "id, destination_id, title, content, mood, created_at, updated_at";
const PHOTO_COLS: &str = "id, destination_id, url, caption, asset_id, created_at";
const COMMENT_COLS: &str = "id, author_id, target_type, target_id, text, created_at, updated_at";

// comment rows hanging off a destination subtree; $1 = destination id
const DELETE_DEST_COMMENTS: &str = r#"
    DELETE FROM comments c WHERE
        (c.target_type = 'Destination' AND c.target_id = $1)
     OR (c.target_type = 'Journal' AND c.target_id IN (SELECT id FROM journals WHERE destination_id = $1))
     OR (c.target_type = 'Photo' AND c.target_id IN (SELECT id FROM photos WHERE destination_id = $1))
"#;

// same for a whole trip; $1 = trip id
const DELETE_TRIP_COMMENTS: &str = r#"
    DELETE FROM comments c WHERE
        (c.target_type = 'Destination' AND c.target_id IN (SELECT id FROM destinations WHERE trip_id = $1))
     OR (c.target_type = 'Journal' AND c.target_id IN (
            SELECT j.id FROM journals j JOIN destinations d ON d.id = j.destination_id WHERE d.trip_id = $1))
     OR (c.target_type = 'Photo' AND c.target_id IN (
            SELECT p.id FROM photos p JOIN destinations d ON d.id = p.destination_id WHERE d.trip_id = $1))
"#;

fn map_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => RepoError::Conflict, // unique_violation
            Some("23503") => RepoError::NotFound, // foreign_key_violation
            _ => RepoError::Internal(e.to_string()),
        },
        _ => RepoError::Internal(e.to_string()),
    }
}

fn like_pattern(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub async fn close(&self) { self.pool.close().await }
}

#[async_trait]
impl AccountRepo for PgRepo {
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        // the UNIQUE indexes on username/email arbitrate concurrent signups
        let sql = format!(
            "INSERT INTO accounts (id, email, name, surname, username, password_hash, provider) \
             VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {ACCOUNT_COLS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.surname)
            .bind(&new.username)
            .bind(&new.password_hash)
            .bind(new.provider)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_account(&self, id: Id) -> RepoResult<Account> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE username = $1");
        sqlx::query_as::<_, Account>(&sql).bind(username).fetch_optional(&self.pool).await.map_err(map_err)
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, Account>(&sql).bind(email).fetch_optional(&self.pool).await.map_err(map_err)
    }

    async fn update_account(&self, id: Id, patch: AccountPatch) -> RepoResult<Account> {
        let sql = format!(
            "UPDATE accounts SET name = COALESCE($2, name), surname = COALESCE($3, surname), \
             username = COALESCE($4, username), password_hash = COALESCE($5, password_hash), \
             updated_at = now() WHERE id = $1 RETURNING {ACCOUNT_COLS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(patch.name.as_ref())
            .bind(patch.surname.as_ref())
            .bind(patch.username.as_ref())
            .bind(patch.password_hash.as_ref())
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn search_accounts(&self, query: &str, limit: usize) -> RepoResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLS} FROM accounts \
             WHERE name ILIKE $1 OR surname ILIKE $1 OR username ILIKE $1 \
             ORDER BY created_at LIMIT $2"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(like_pattern(query))
            .bind(limit as i64)
            .fetch_all(&self.pool).await.map_err(map_err)
    }
}

#[async_trait]
impl TripRepo for PgRepo {
    async fn create_trip(&self, owner_id: Id, new: NewTrip) -> RepoResult<Trip> {
        let sql = format!(
            "INSERT INTO trips (id, owner_id, title, description, start_date, end_date) \
             VALUES ($1,$2,$3,$4,$5,$6) RETURNING {TRIP_COLS}"
        );
        sqlx::query_as::<_, Trip>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.start_date)
            .bind(new.end_date)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_trip(&self, id: Id) -> RepoResult<Trip> {
        let sql = format!("SELECT {TRIP_COLS} FROM trips WHERE id = $1");
        sqlx::query_as::<_, Trip>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn list_trips(&self, owner_id: Id) -> RepoResult<Vec<Trip>> {
        let sql = format!("SELECT {TRIP_COLS} FROM trips WHERE owner_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Trip>(&sql).bind(owner_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn update_trip(&self, id: Id, upd: UpdateTrip) -> RepoResult<Trip> {
        let sql = format!(
            "UPDATE trips SET title = COALESCE($2, title), description = COALESCE($3, description), \
             start_date = COALESCE($4, start_date), end_date = COALESCE($5, end_date), updated_at = now() \
             WHERE id = $1 RETURNING {TRIP_COLS}"
        );
        sqlx::query_as::<_, Trip>(&sql)
            .bind(id)
            .bind(upd.title.as_ref())
            .bind(upd.description.as_ref())
            .bind(upd.start_date)
            .bind(upd.end_date)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn delete_trip(&self, id: Id) -> RepoResult<Vec<Photo>> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        // row locks make concurrent photo inserts wait, then fail their FK check
        sqlx::query("SELECT id FROM destinations WHERE trip_id = $1 FOR UPDATE")
            .bind(id).execute(&mut *tx).await.map_err(map_err)?;
        sqlx::query(DELETE_TRIP_COMMENTS).bind(id).execute(&mut *tx).await.map_err(map_err)?;
        let sql = format!(
            "DELETE FROM photos WHERE destination_id IN (SELECT id FROM destinations WHERE trip_id = $1) \
             RETURNING {PHOTO_COLS}"
        );
        let removed = sqlx::query_as::<_, Photo>(&sql).bind(id).fetch_all(&mut *tx).await.map_err(map_err)?;
        // destinations and journals go through ON DELETE CASCADE
        let done = sqlx::query("DELETE FROM trips WHERE id = $1").bind(id).execute(&mut *tx).await.map_err(map_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        tx.commit().await.map_err(map_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl DestinationRepo for PgRepo {
    async fn create_destination(&self, trip_id: Id, new: NewDestination) -> RepoResult<Destination> {
        let sql = format!(
            "INSERT INTO destinations (id, trip_id, title, location, description, date_visited) \
             VALUES ($1,$2,$3,$4,$5,$6) RETURNING {DEST_COLS}"
        );
        sqlx::query_as::<_, Destination>(&sql)
            .bind(Uuid::new_v4())
            .bind(trip_id)
            .bind(&new.title)
            .bind(&new.location)
            .bind(&new.description)
            .bind(new.date_visited)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_destination(&self, id: Id) -> RepoResult<Destination> {
        let sql = format!("SELECT {DEST_COLS} FROM destinations WHERE id = $1");
        sqlx::query_as::<_, Destination>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn list_destinations(&self, trip_id: Id) -> RepoResult<Vec<Destination>> {
        let sql = format!("SELECT {DEST_COLS} FROM destinations WHERE trip_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Destination>(&sql).bind(trip_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn update_destination(&self, id: Id, upd: UpdateDestination) -> RepoResult<Destination> {
        let sql = format!(
            "UPDATE destinations SET title = COALESCE($2, title), location = COALESCE($3, location), \
             description = COALESCE($4, description), date_visited = COALESCE($5, date_visited), \
             updated_at = now() WHERE id = $1 RETURNING {DEST_COLS}"
        );
        sqlx::query_as::<_, Destination>(&sql)
            .bind(id)
            .bind(upd.title.as_ref())
            .bind(upd.location.as_ref())
            .bind(upd.description.as_ref())
            .bind(upd.date_visited)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn delete_destination(&self, id: Id) -> RepoResult<Vec<Photo>> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("SELECT id FROM destinations WHERE id = $1 FOR UPDATE")
            .bind(id).execute(&mut *tx).await.map_err(map_err)?;
        sqlx::query(DELETE_DEST_COMMENTS).bind(id).execute(&mut *tx).await.map_err(map_err)?;
        let sql = format!("DELETE FROM photos WHERE destination_id = $1 RETURNING {PHOTO_COLS}");
        let removed = sqlx::query_as::<_, Photo>(&sql).bind(id).fetch_all(&mut *tx).await.map_err(map_err)?;
        let done = sqlx::query("DELETE FROM destinations WHERE id = $1").bind(id).execute(&mut *tx).await.map_err(map_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        tx.commit().await.map_err(map_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl JournalRepo for PgRepo {
    async fn create_journal(&self, destination_id: Id, new: NewJournal) -> RepoResult<Journal> {
        let sql = format!(
            "INSERT INTO journals (id, destination_id, title, content, mood) \
             VALUES ($1,$2,$3,$4,$5) RETURNING {JOURNAL_COLS}"
        );
        sqlx::query_as::<_, Journal>(&sql)
            .bind(Uuid::new_v4())
            .bind(destination_id)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.mood)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_journal(&self, id: Id) -> RepoResult<Journal> {
        let sql = format!("SELECT {JOURNAL_COLS} FROM journals WHERE id = $1");
        sqlx::query_as::<_, Journal>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn list_journals(&self, destination_id: Id) -> RepoResult<Vec<Journal>> {
        let sql = format!("SELECT {JOURNAL_COLS} FROM journals WHERE destination_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Journal>(&sql).bind(destination_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn update_journal(&self, id: Id, upd: UpdateJournal) -> RepoResult<Journal> {
        let sql = format!(
            "UPDATE journals SET title = COALESCE($2, title), content = COALESCE($3, content), \
             mood = COALESCE($4, mood), updated_at = now() WHERE id = $1 RETURNING {JOURNAL_COLS}"
        );
        sqlx::query_as::<_, Journal>(&sql)
            .bind(id)
            .bind(upd.title.as_ref())
            .bind(upd.content.as_ref())
            .bind(upd.mood)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn delete_journal(&self, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM comments WHERE target_type = 'Journal' AND target_id = $1")
            .bind(id).execute(&mut *tx).await.map_err(map_err)?;
        let done = sqlx::query("DELETE FROM journals WHERE id = $1").bind(id).execute(&mut *tx).await.map_err(map_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        tx.commit().await.map_err(map_err)
    }
}

#[async_trait]
impl PhotoRepo for PgRepo {
    async fn create_photo(&self, new: NewPhoto) -> RepoResult<Photo> {
        let sql = format!(
            "INSERT INTO photos (id, destination_id, url, caption, asset_id) \
             VALUES ($1,$2,$3,$4,$5) RETURNING {PHOTO_COLS}"
        );
        sqlx::query_as::<_, Photo>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.destination_id)
            .bind(&new.url)
            .bind(&new.caption)
            .bind(&new.asset_id)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_photo(&self, id: Id) -> RepoResult<Photo> {
        let sql = format!("SELECT {PHOTO_COLS} FROM photos WHERE id = $1");
        sqlx::query_as::<_, Photo>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn list_photos(&self, destination_id: Id) -> RepoResult<Vec<Photo>> {
        let sql = format!("SELECT {PHOTO_COLS} FROM photos WHERE destination_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Photo>(&sql).bind(destination_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn list_trip_photos(&self, trip_id: Id) -> RepoResult<Vec<Photo>> {
        let sql = r#"
            SELECT p.id, p.destination_id, p.url, p.caption, p.asset_id, p.created_at
            FROM photos p JOIN destinations d ON d.id = p.destination_id
            WHERE d.trip_id = $1
            ORDER BY p.created_at DESC
        "#;
        sqlx::query_as::<_, Photo>(sql).bind(trip_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn delete_photo(&self, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("DELETE FROM comments WHERE target_type = 'Photo' AND target_id = $1")
            .bind(id).execute(&mut *tx).await.map_err(map_err)?;
        let done = sqlx::query("DELETE FROM photos WHERE id = $1").bind(id).execute(&mut *tx).await.map_err(map_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        tx.commit().await.map_err(map_err)
    }
}

#[async_trait]
impl CommentRepo for PgRepo {
    async fn create_comment(&self, author_id: Id, new: NewComment) -> RepoResult<Comment> {
        let table = match new.target_type {
            CommentTarget::Journal => "journals",
            CommentTarget::Photo => "photos",
            CommentTarget::Destination => "destinations",
        };
        let sql = format!(
            "INSERT INTO comments (id, author_id, target_type, target_id, text) \
             SELECT $1,$2,$3,$4,$5 WHERE EXISTS (SELECT 1 FROM {table} WHERE id = $4) \
             RETURNING {COMMENT_COLS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(Uuid::new_v4())
            .bind(author_id)
            .bind(new.target_type)
            .bind(new.target_id)
            .bind(&new.text)
            .fetch_optional(&self.pool).await.map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        let sql = format!("SELECT {COMMENT_COLS} FROM comments WHERE id = $1");
        sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn list_comments(&self, target_type: CommentTarget, target_id: Id) -> RepoResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLS} FROM comments WHERE target_type = $1 AND target_id = $2 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(target_type)
            .bind(target_id)
            .fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn update_comment(&self, id: Id, upd: UpdateComment) -> RepoResult<Comment> {
        let sql = format!(
            "UPDATE comments SET text = COALESCE($2, text), updated_at = now() WHERE id = $1 RETURNING {COMMENT_COLS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(upd.text.as_ref())
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn delete_comment(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM comments WHERE id = $1").bind(id).execute(&self.pool).await.map_err(map_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl FollowRepo for PgRepo {
    async fn follow(&self, follower: Id, followee: Id) -> RepoResult<bool> {
        let done = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) VALUES ($1,$2) ON CONFLICT DO NOTHING",
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.pool).await.map_err(map_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn unfollow(&self, follower: Id, followee: Id) -> RepoResult<bool> {
        let done = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool).await.map_err(map_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn list_following(&self, id: Id) -> RepoResult<Vec<Id>> {
        sqlx::query_scalar::<_, Id>("SELECT followee_id FROM follows WHERE follower_id = $1 ORDER BY created_at")
            .bind(id)
            .fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn list_followers(&self, id: Id) -> RepoResult<Vec<Id>> {
        sqlx::query_scalar::<_, Id>("SELECT follower_id FROM follows WHERE followee_id = $1 ORDER BY created_at")
            .bind(id)
            .fetch_all(&self.pool).await.map_err(map_err)
    }
}
