//! Ownership resolution and authorization.
//!
//! Trips, destinations, journals and photos form a tree rooted at the
//! account that owns the trip:
//!
//! ```text
//! Account ─ Trip ─ Destination ─┬─ Journal
//!                               └─ Photo
//! ```
//!
//! Only the trip stores its owner. Every other node stores a reference to its
//! parent, so the owning account is found by walking upward through the store
//! until the trip is reached. Comments sit outside that tree: they are guarded
//! by authorship, and owning the commented resource grants nothing over them.
//!
//! Any broken link in the walk is reported as [`AuthzError::Missing`], which is
//! distinct from a denial and is never turned into a grant.

use std::fmt;

use async_trait::async_trait;

use crate::models::{Comment, Destination, Id, Journal, Photo, Trip};
use crate::repo::{DestinationRepo, Repo, RepoError, TripRepo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Trip,
    Destination,
    Journal,
    Photo,
    Comment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Trip => "Trip",
            ResourceKind::Destination => "Destination",
            ResourceKind::Journal => "Journal",
            ResourceKind::Photo => "Photo",
            ResourceKind::Comment => "Comment",
        };
        f.write_str(s)
    }
}

/// Relation the actor must hold over the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Actor is the account at the root of the ownership chain.
    IsOwner,
    /// Actor wrote the resource.
    IsAuthor,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{kind} {id} not found")]
    Missing { kind: ResourceKind, id: Id },
    #[error("actor does not hold {relation:?} over {kind}")]
    Forbidden { kind: ResourceKind, relation: Relation },
    #[error("{relation:?} does not apply to {kind}")]
    NotApplicable { kind: ResourceKind, relation: Relation },
    #[error("store error: {0}")]
    Store(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;

fn lookup_err(kind: ResourceKind, id: Id) -> impl FnOnce(RepoError) -> AuthzError {
    move |e| match e {
        RepoError::NotFound => AuthzError::Missing { kind, id },
        other => AuthzError::Store(other.to_string()),
    }
}

/// A node of the ownership tree.
#[async_trait]
pub trait Owned: Send + Sync {
    /// Account at the root of this node's chain. Ancestors are loaded on
    /// demand, so callers may pass a node fetched on its own.
    async fn resolve_owner(&self, repo: &dyn Repo) -> AuthzResult<Id>;
}

#[async_trait]
impl Owned for Trip {
    async fn resolve_owner(&self, _repo: &dyn Repo) -> AuthzResult<Id> {
        Ok(self.owner_id)
    }
}

#[async_trait]
impl Owned for Destination {
    async fn resolve_owner(&self, repo: &dyn Repo) -> AuthzResult<Id> {
        let trip = repo
            .get_trip(self.trip_id)
            .await
            .map_err(lookup_err(ResourceKind::Trip, self.trip_id))?;
        trip.resolve_owner(repo).await
    }
}

async fn owner_via_destination(repo: &dyn Repo, destination_id: Id) -> AuthzResult<Id> {
    let dest = repo
        .get_destination(destination_id)
        .await
        .map_err(lookup_err(ResourceKind::Destination, destination_id))?;
    dest.resolve_owner(repo).await
}

#[async_trait]
impl Owned for Journal {
    async fn resolve_owner(&self, repo: &dyn Repo) -> AuthzResult<Id> {
        owner_via_destination(repo, self.destination_id).await
    }
}

#[async_trait]
impl Owned for Photo {
    async fn resolve_owner(&self, repo: &dyn Repo) -> AuthzResult<Id> {
        owner_via_destination(repo, self.destination_id).await
    }
}

/// Anything an authorization decision can be made about.
#[async_trait]
pub trait Guarded: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// The account holding `relation` over this resource.
    async fn holder(&self, relation: Relation, repo: &dyn Repo) -> AuthzResult<Id>;
}

macro_rules! guarded_by_owner {
    ($($ty:ident),+) => {$(
        #[async_trait]
        impl Guarded for $ty {
            fn kind(&self) -> ResourceKind { ResourceKind::$ty }

            async fn holder(&self, relation: Relation, repo: &dyn Repo) -> AuthzResult<Id> {
                match relation {
                    Relation::IsOwner => self.resolve_owner(repo).await,
                    Relation::IsAuthor => Err(AuthzError::NotApplicable { kind: ResourceKind::$ty, relation }),
                }
            }
        }
    )+};
}

guarded_by_owner!(Trip, Destination, Journal, Photo);

#[async_trait]
impl Guarded for Comment {
    fn kind(&self) -> ResourceKind { ResourceKind::Comment }

    async fn holder(&self, relation: Relation, _repo: &dyn Repo) -> AuthzResult<Id> {
        match relation {
            Relation::IsAuthor => Ok(self.author_id),
            // never falls back to the owner of the commented resource
            Relation::IsOwner => Err(AuthzError::NotApplicable { kind: ResourceKind::Comment, relation }),
        }
    }
}

/// Succeeds iff `actor` holds `relation` over `target`.
pub async fn authorize<T>(repo: &dyn Repo, actor: Id, target: &T, relation: Relation) -> AuthzResult<()>
where
    T: Guarded + ?Sized,
{
    let holder = target.holder(relation, repo).await?;
    if holder == actor {
        Ok(())
    } else {
        metrics::increment_counter!("wanderlog_authz_denied_total");
        tracing::warn!(kind = %target.kind(), ?relation, %actor, "authorization denied");
        Err(AuthzError::Forbidden { kind: target.kind(), relation })
    }
}
