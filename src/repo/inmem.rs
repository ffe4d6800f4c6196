use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::*;

#[derive(Default)]
struct State {
    accounts: HashMap<Id, Account>,
    trips: HashMap<Id, Trip>,
    destinations: HashMap<Id, Destination>,
    journals: HashMap<Id, Journal>,
    photos: HashMap<Id, Photo>,
    comments: HashMap<Id, Comment>,
    follows: BTreeSet<(Id, Id)>, // (follower, followee)
}

impl State {
    fn username_taken(&self, username: &str, except: Option<Id>) -> bool {
        self.accounts
            .values()
            .any(|a| a.username.as_deref() == Some(username) && Some(a.id) != except)
    }

    /// Drops every comment whose target is in `targets`.
    fn drop_comments(&mut self, targets: &HashSet<(CommentTarget, Id)>) {
        self.comments.retain(|_, c| !targets.contains(&(c.target_type, c.target_id)));
    }

    /// Removes the destination subtree, the destination row itself included,
    /// and hands back the photos it held.
    fn drop_destination(&mut self, dest_id: Id) -> Vec<Photo> {
        let mut targets = HashSet::new();
        targets.insert((CommentTarget::Destination, dest_id));
        self.journals.retain(|id, j| {
            let keep = j.destination_id != dest_id;
            if !keep { targets.insert((CommentTarget::Journal, *id)); }
            keep
        });
        let photo_ids: Vec<Id> = self.photos.values().filter(|p| p.destination_id == dest_id).map(|p| p.id).collect();
        let mut removed = Vec::with_capacity(photo_ids.len());
        for id in photo_ids {
            if let Some(photo) = self.photos.remove(&id) {
                targets.insert((CommentTarget::Photo, id));
                removed.push(photo);
            }
        }
        self.drop_comments(&targets);
        self.destinations.remove(&dest_id);
        removed
    }
}

/// Process-local store used for development and tests.
#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }
}

fn newest_first<T, F>(mut v: Vec<T>, created: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    v.sort_by_key(|x| std::cmp::Reverse(created(x)));
    v
}

#[async_trait]
impl AccountRepo for InMemRepo {
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        let mut s = self.write()?;
        // the check and the insert share one write lock, so concurrent
        // signups for the same handle cannot both succeed
        if let Some(u) = &new.username {
            if s.username_taken(u, None) { return Err(RepoError::Conflict); }
        }
        if let Some(e) = &new.email {
            if s.accounts.values().any(|a| a.email.as_deref() == Some(e.as_str())) {
                return Err(RepoError::Conflict);
            }
        }
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            surname: new.surname,
            username: new.username,
            password_hash: new.password_hash,
            provider: new.provider,
            created_at: now,
            updated_at: now,
        };
        s.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: Id) -> RepoResult<Account> {
        self.read()?.accounts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let s = self.read()?;
        Ok(s.accounts.values().find(|a| a.username.as_deref() == Some(username)).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let s = self.read()?;
        Ok(s.accounts.values().find(|a| a.email.as_deref() == Some(email)).cloned())
    }

    async fn update_account(&self, id: Id, patch: AccountPatch) -> RepoResult<Account> {
        let mut s = self.write()?;
        if let Some(u) = &patch.username {
            if s.username_taken(u, Some(id)) { return Err(RepoError::Conflict); }
        }
        let account = s.accounts.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = patch.name { account.name = v; }
        if let Some(v) = patch.surname { account.surname = Some(v); }
        if let Some(v) = patch.username { account.username = Some(v); }
        if let Some(v) = patch.password_hash { account.password_hash = Some(v); }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn search_accounts(&self, query: &str, limit: usize) -> RepoResult<Vec<Account>> {
        let needle = query.to_lowercase();
        let s = self.read()?;
        let mut hits: Vec<Account> = s.accounts.values().filter(|a| a.matches_query(&needle)).cloned().collect();
        hits.sort_by_key(|a| a.created_at);
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl TripRepo for InMemRepo {
    async fn create_trip(&self, owner_id: Id, new: NewTrip) -> RepoResult<Trip> {
        let mut s = self.write()?;
        if !s.accounts.contains_key(&owner_id) { return Err(RepoError::NotFound); }
        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            owner_id,
            title: new.title,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        };
        s.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn get_trip(&self, id: Id) -> RepoResult<Trip> {
        self.read()?.trips.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_trips(&self, owner_id: Id) -> RepoResult<Vec<Trip>> {
        let s = self.read()?;
        let v = s.trips.values().filter(|t| t.owner_id == owner_id).cloned().collect();
        Ok(newest_first(v, |t: &Trip| t.created_at))
    }

    async fn update_trip(&self, id: Id, upd: UpdateTrip) -> RepoResult<Trip> {
        let mut s = self.write()?;
        let trip = s.trips.get_mut(&id).ok_or(RepoError::NotFound)?;
        trip.apply(&upd);
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }

    async fn delete_trip(&self, id: Id) -> RepoResult<Vec<Photo>> {
        let mut s = self.write()?;
        if s.trips.remove(&id).is_none() { return Err(RepoError::NotFound); }
        let dests: Vec<Id> = s.destinations.values().filter(|d| d.trip_id == id).map(|d| d.id).collect();
        let mut removed = Vec::new();
        for d in dests {
            removed.extend(s.drop_destination(d));
        }
        Ok(removed)
    }
}

#[async_trait]
impl DestinationRepo for InMemRepo {
    async fn create_destination(&self, trip_id: Id, new: NewDestination) -> RepoResult<Destination> {
        let mut s = self.write()?;
        if !s.trips.contains_key(&trip_id) { return Err(RepoError::NotFound); }
        let now = Utc::now();
        let dest = Destination {
            id: Uuid::new_v4(),
            trip_id,
            title: new.title,
            location: new.location,
            description: new.description,
            date_visited: new.date_visited,
            created_at: now,
            updated_at: now,
        };
        s.destinations.insert(dest.id, dest.clone());
        Ok(dest)
    }

    async fn get_destination(&self, id: Id) -> RepoResult<Destination> {
        self.read()?.destinations.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_destinations(&self, trip_id: Id) -> RepoResult<Vec<Destination>> {
        let s = self.read()?;
        let v = s.destinations.values().filter(|d| d.trip_id == trip_id).cloned().collect();
        Ok(newest_first(v, |d: &Destination| d.created_at))
    }

    async fn update_destination(&self, id: Id, upd: UpdateDestination) -> RepoResult<Destination> {
        let mut s = self.write()?;
        let dest = s.destinations.get_mut(&id).ok_or(RepoError::NotFound)?;
        dest.apply(&upd);
        dest.updated_at = Utc::now();
        Ok(dest.clone())
    }

    async fn delete_destination(&self, id: Id) -> RepoResult<Vec<Photo>> {
        let mut s = self.write()?;
        if !s.destinations.contains_key(&id) { return Err(RepoError::NotFound); }
        Ok(s.drop_destination(id))
    }
}

#[async_trait]
impl JournalRepo for InMemRepo {
    async fn create_journal(&self, destination_id: Id, new: NewJournal) -> RepoResult<Journal> {
        let mut s = self.write()?;
        if !s.destinations.contains_key(&destination_id) { return Err(RepoError::NotFound); }
        let now = Utc::now();
        let journal = Journal {
            id: Uuid::new_v4(),
            destination_id,
            title: new.title,
            content: new.content,
            mood: new.mood,
            created_at: now,
            updated_at: now,
        };
        s.journals.insert(journal.id, journal.clone());
        Ok(journal)
    }

    async fn get_journal(&self, id: Id) -> RepoResult<Journal> {
        self.read()?.journals.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_journals(&self, destination_id: Id) -> RepoResult<Vec<Journal>> {
        let s = self.read()?;
        let v = s.journals.values().filter(|j| j.destination_id == destination_id).cloned().collect();
        Ok(newest_first(v, |j: &Journal| j.created_at))
    }

    async fn update_journal(&self, id: Id, upd: UpdateJournal) -> RepoResult<Journal> {
        let mut s = self.write()?;
        let journal = s.journals.get_mut(&id).ok_or(RepoError::NotFound)?;
        journal.apply(&upd);
        journal.updated_at = Utc::now();
        Ok(journal.clone())
    }

    async fn delete_journal(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if s.journals.remove(&id).is_none() { return Err(RepoError::NotFound); }
        s.drop_comments(&HashSet::from([(CommentTarget::Journal, id)]));
        Ok(())
    }
}

#[async_trait]
impl PhotoRepo for InMemRepo {
    async fn create_photo(&self, new: NewPhoto) -> RepoResult<Photo> {
        let mut s = self.write()?;
        if !s.destinations.contains_key(&new.destination_id) { return Err(RepoError::NotFound); }
        let photo = Photo {
            id: Uuid::new_v4(),
            destination_id: new.destination_id,
            url: new.url,
            caption: new.caption,
            asset_id: new.asset_id,
            created_at: Utc::now(),
        };
        s.photos.insert(photo.id, photo.clone());
        Ok(photo)
    }

    async fn get_photo(&self, id: Id) -> RepoResult<Photo> {
        self.read()?.photos.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_photos(&self, destination_id: Id) -> RepoResult<Vec<Photo>> {
        let s = self.read()?;
        let v = s.photos.values().filter(|p| p.destination_id == destination_id).cloned().collect();
        Ok(newest_first(v, |p: &Photo| p.created_at))
    }

    async fn list_trip_photos(&self, trip_id: Id) -> RepoResult<Vec<Photo>> {
        let s = self.read()?;
        let dests: HashSet<Id> = s.destinations.values().filter(|d| d.trip_id == trip_id).map(|d| d.id).collect();
        let v = s.photos.values().filter(|p| dests.contains(&p.destination_id)).cloned().collect();
        Ok(newest_first(v, |p: &Photo| p.created_at))
    }

    async fn delete_photo(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if s.photos.remove(&id).is_none() { return Err(RepoError::NotFound); }
        s.drop_comments(&HashSet::from([(CommentTarget::Photo, id)]));
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for InMemRepo {
    async fn create_comment(&self, author_id: Id, new: NewComment) -> RepoResult<Comment> {
        let mut s = self.write()?;
        let target_exists = match new.target_type {
            CommentTarget::Journal => s.journals.contains_key(&new.target_id),
            CommentTarget::Photo => s.photos.contains_key(&new.target_id),
            CommentTarget::Destination => s.destinations.contains_key(&new.target_id),
        };
        if !target_exists || !s.accounts.contains_key(&author_id) { return Err(RepoError::NotFound); }
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            author_id,
            target_type: new.target_type,
            target_id: new.target_id,
            text: new.text,
            created_at: now,
            updated_at: now,
        };
        s.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        self.read()?.comments.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_comments(&self, target_type: CommentTarget, target_id: Id) -> RepoResult<Vec<Comment>> {
        let s = self.read()?;
        let v = s.comments
            .values()
            .filter(|c| c.target_type == target_type && c.target_id == target_id)
            .cloned()
            .collect();
        Ok(newest_first(v, |c: &Comment| c.created_at))
    }

    async fn update_comment(&self, id: Id, upd: UpdateComment) -> RepoResult<Comment> {
        let mut s = self.write()?;
        let comment = s.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(text) = upd.text { comment.text = text; }
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.comments.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl FollowRepo for InMemRepo {
    async fn follow(&self, follower: Id, followee: Id) -> RepoResult<bool> {
        let mut s = self.write()?;
        if !s.accounts.contains_key(&follower) || !s.accounts.contains_key(&followee) {
            return Err(RepoError::NotFound);
        }
        Ok(s.follows.insert((follower, followee)))
    }

    async fn unfollow(&self, follower: Id, followee: Id) -> RepoResult<bool> {
        let mut s = self.write()?;
        Ok(s.follows.remove(&(follower, followee)))
    }

    async fn list_following(&self, id: Id) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(s.follows.iter().filter(|(a, _)| *a == id).map(|(_, b)| *b).collect())
    }

    async fn list_followers(&self, id: Id) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(s.follows.iter().filter(|(_, b)| *b == id).map(|(a, _)| *a).collect())
    }
}
