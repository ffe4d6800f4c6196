use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("store error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Fails with `Conflict` when the username or email is already taken.
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account>;
    async fn get_account(&self, id: Id) -> RepoResult<Account>;
    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>>;
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>>;
    async fn update_account(&self, id: Id, patch: AccountPatch) -> RepoResult<Account>;
    /// Case-insensitive substring match on username, name and surname.
    async fn search_accounts(&self, query: &str, limit: usize) -> RepoResult<Vec<Account>>;
}

#[async_trait]
pub trait TripRepo: Send + Sync {
    async fn create_trip(&self, owner_id: Id, new: NewTrip) -> RepoResult<Trip>;
    async fn get_trip(&self, id: Id) -> RepoResult<Trip>;
    async fn list_trips(&self, owner_id: Id) -> RepoResult<Vec<Trip>>;
    async fn update_trip(&self, id: Id, upd: UpdateTrip) -> RepoResult<Trip>;
    /// Removes the trip together with its destinations, their journals,
    /// photos, and every comment targeting any of them. Returns the photo
    /// records the cascade removed so their stored binaries can be dropped.
    async fn delete_trip(&self, id: Id) -> RepoResult<Vec<Photo>>;
}

#[async_trait]
pub trait DestinationRepo: Send + Sync {
    async fn create_destination(&self, trip_id: Id, new: NewDestination) -> RepoResult<Destination>;
    async fn get_destination(&self, id: Id) -> RepoResult<Destination>;
    async fn list_destinations(&self, trip_id: Id) -> RepoResult<Vec<Destination>>;
    async fn update_destination(&self, id: Id, upd: UpdateDestination) -> RepoResult<Destination>;
    /// Cascades to journals, photos and comments under the destination.
    /// Returns the photo records the cascade removed.
    async fn delete_destination(&self, id: Id) -> RepoResult<Vec<Photo>>;
}

#[async_trait]
pub trait JournalRepo: Send + Sync {
    async fn create_journal(&self, destination_id: Id, new: NewJournal) -> RepoResult<Journal>;
    async fn get_journal(&self, id: Id) -> RepoResult<Journal>;
    async fn list_journals(&self, destination_id: Id) -> RepoResult<Vec<Journal>>;
    async fn update_journal(&self, id: Id, upd: UpdateJournal) -> RepoResult<Journal>;
    async fn delete_journal(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PhotoRepo: Send + Sync {
    async fn create_photo(&self, new: NewPhoto) -> RepoResult<Photo>;
    async fn get_photo(&self, id: Id) -> RepoResult<Photo>;
    async fn list_photos(&self, destination_id: Id) -> RepoResult<Vec<Photo>>;
    /// Every photo below the trip, across all of its destinations.
    async fn list_trip_photos(&self, trip_id: Id) -> RepoResult<Vec<Photo>>;
    async fn delete_photo(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, author_id: Id, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    async fn list_comments(&self, target_type: CommentTarget, target_id: Id) -> RepoResult<Vec<Comment>>;
    async fn update_comment(&self, id: Id, upd: UpdateComment) -> RepoResult<Comment>;
    async fn delete_comment(&self, id: Id) -> RepoResult<()>;
}

/// Follow edges are single records keyed by (follower, followee); both the
/// `following` and the `followers` view are read from the same edge set.
#[async_trait]
pub trait FollowRepo: Send + Sync {
    /// Returns `true` when a new edge was created.
    async fn follow(&self, follower: Id, followee: Id) -> RepoResult<bool>;
    /// Returns `true` when an edge was removed.
    async fn unfollow(&self, follower: Id, followee: Id) -> RepoResult<bool>;
    async fn list_following(&self, id: Id) -> RepoResult<Vec<Id>>;
    async fn list_followers(&self, id: Id) -> RepoResult<Vec<Id>>;
}

pub trait Repo:
    AccountRepo + TripRepo + DestinationRepo + JournalRepo + PhotoRepo + CommentRepo + FollowRepo
{
}

impl<T> Repo for T where
    T: AccountRepo + TripRepo + DestinationRepo + JournalRepo + PhotoRepo + CommentRepo + FollowRepo
{
}

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;
