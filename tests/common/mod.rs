#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use argon2::Params;
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use wanderlog::auth::{SecretHasher, TokenService};
use wanderlog::identity::Identity;
use wanderlog::models::*;
use wanderlog::repo::inmem::InMemRepo;
use wanderlog::repo::{DestinationRepo, JournalRepo, PhotoRepo, Repo, TripRepo};
use wanderlog::storage::{AssetStore, AssetStoreError, StoredAsset};
use wanderlog::AppState;

pub const SECRET: &[u8] = b"test-secret-must-be-32-bytes-long!!";

/// Builds the service under test from an `AppState`.
#[macro_export]
macro_rules! app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state))
                .configure(wanderlog::config),
        )
        .await
    };
}

// ---------------- In-memory mock AssetStore (tests only) ----------------
#[derive(Default)]
pub struct MockAssetStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_deletes: AtomicBool,
    /// Asset ids whose delete is rejected while everything else succeeds.
    pub fail_for: Mutex<HashSet<String>>,
    /// Runs once, ahead of the next delete.
    pub before_delete: Mutex<Option<BoxFuture<'static, ()>>>,
    counter: AtomicUsize,
}

impl MockAssetStore {
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(asset_id)
    }
}

#[async_trait::async_trait]
impl AssetStore for MockAssetStore {
    async fn store(&self, bytes: Vec<u8>, folder: &str) -> Result<StoredAsset, AssetStoreError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let key = format!("{folder}/{n}");
        self.objects.lock().unwrap().insert(key.clone(), bytes);
        Ok(StoredAsset { url: format!("http://assets.test/{key}"), asset_id: key })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), AssetStoreError> {
        let hook = self.before_delete.lock().unwrap().take();
        if let Some(hook) = hook {
            hook.await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) || self.fail_for.lock().unwrap().contains(asset_id) {
            return Err(AssetStoreError::Rejected("simulated outage".into()));
        }
        self.objects.lock().unwrap().remove(asset_id);
        Ok(())
    }
}

pub fn cheap_hasher() -> SecretHasher {
    SecretHasher::with_params(Params::new(1024, 1, 1, None).unwrap())
}

/// App state over an in-memory store plus direct handles for seeding and
/// inspecting it.
pub struct Harness {
    pub state: AppState,
    pub repo: InMemRepo,
    pub assets: Arc<MockAssetStore>,
}

impl Harness {
    pub fn new() -> Self {
        let repo = InMemRepo::new();
        let assets = Arc::new(MockAssetStore::default());
        let shared: Arc<dyn Repo> = Arc::new(repo.clone());
        let identity = Identity::new(shared.clone(), cheap_hasher(), TokenService::new(SECRET));
        let state = AppState::new(shared, identity, assets.clone());
        Self { state, repo, assets }
    }

    /// Registers a local account and returns its id and a bearer token.
    pub async fn account(&self, username: &str) -> (Id, String) {
        let id = self
            .state
            .identity
            .register(SignupRequest {
                name: username.to_string(),
                surname: "Tester".into(),
                username: username.to_string(),
                password: "password1".into(),
            })
            .await
            .unwrap();
        let token = self.state.identity.issue_token(id).unwrap();
        (id, token)
    }

    pub async fn trip(&self, owner: Id) -> Trip {
        self.repo
            .create_trip(owner, NewTrip {
                title: "Italy".into(),
                description: "Spring trip".into(),
                start_date: day(1),
                end_date: day(10),
            })
            .await
            .unwrap()
    }

    pub async fn destination(&self, trip_id: Id) -> Destination {
        self.repo
            .create_destination(trip_id, NewDestination {
                title: "Rome".into(),
                location: "Rome, IT".into(),
                description: "Colosseum".into(),
                date_visited: day(2),
            })
            .await
            .unwrap()
    }

    pub async fn journal(&self, destination_id: Id) -> Journal {
        self.repo
            .create_journal(destination_id, NewJournal { title: "Day 1".into(), content: "Gelato".into(), mood: Mood::Happy })
            .await
            .unwrap()
    }

    /// Stores a fake binary in the mock and records a photo pointing at it.
    pub async fn photo(&self, destination_id: Id) -> Photo {
        let stored = self.assets.store(png(), &format!("wanderlog/photos/{destination_id}")).await.unwrap();
        self.repo
            .create_photo(NewPhoto { destination_id, url: stored.url, caption: None, asset_id: stored.asset_id })
            .await
            .unwrap()
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

// Minimal 1x1 PNG (transparent)
pub fn png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// Multipart body with a `photo` file part and an optional `caption` part.
pub fn multipart(bytes: &[u8], caption: Option<&str>) -> (String, Vec<u8>) {
    let boundary = "XBOUNDARYX";
    let mut body: Vec<u8> = Vec::new();
    if let Some(c) = caption {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\n{c}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"p.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
