use crate::cache::memory::InMemoryCache;
use crate::cache::{Cache, CacheBackend, CacheError};
use crate::client::Client;
use crate::config::{CacheStore, Settings};
use crate::state::AppState;
use crate::store::MemoryDirectory;
use crate::token::signer::SignatureAlgorithm;
use crate::uma::{ClaimsGatheringRegistry, PolicyScriptRegistry};
use crate::user::User;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_CLIENT_ID: &str = "@!1111!0008!fe17";
pub const TEST_USER_ID: &str = "jane";

/// Test fixture wiring every service against an in-memory directory and cache.
///
/// A client and a user are persisted up front so grants can be issued right away.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_grant() {
///     let fixture = TestFixture::new().await;
///     let grant = fixture
///         .state
///         .grants
///         .create_implicit_grant(Some(fixture.user.clone()), fixture.client.clone(), None);
/// }
/// ```
pub struct TestFixture {
    /// Application state holding every service
    pub state: AppState,
    /// Registered client with a secret and HS256 ID tokens
    pub client: Client,
    /// Registered user with an email claim
    pub user: User,
    /// Configuration settings
    pub settings: Settings,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::new_with(|_| {}).await
    }

    /// Creates a fixture after letting `modifier` adjust the default settings
    pub async fn new_with<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut Settings),
    {
        Self::new_with_scripts(
            modifier,
            PolicyScriptRegistry::new(),
            ClaimsGatheringRegistry::new(),
        )
        .await
    }

    pub async fn new_with_scripts<F>(
        modifier: F,
        policies: PolicyScriptRegistry,
        claims_gathering: ClaimsGatheringRegistry,
    ) -> Self
    where
        F: FnOnce(&mut Settings),
    {
        setup_test_logger();

        let mut settings = Settings::default();
        settings.cache.store = CacheStore::InMemory;
        settings.base_dn.clients = "ou=clients,o=test".to_string();
        settings.base_dn.people = "ou=people,o=test".to_string();
        settings.base_dn.uma_base = "ou=uma,o=test".to_string();
        settings.base_dn.sector_identifiers = "ou=sector_identifiers,o=test".to_string();
        modifier(&mut settings);

        let cache = InMemoryCache::new(60, 16).expect("Failed to create cache");
        let state = AppState::with_existing_cache(
            settings.clone(),
            Cache::InMemory(cache),
            Arc::new(MemoryDirectory::new()),
            policies,
            claims_gathering,
        )
        .expect("Failed to create app state");

        let client = Client {
            dn: state.clients.build_dn(TEST_CLIENT_ID),
            client_id: TEST_CLIENT_ID.to_string(),
            client_secret: Some("secret".to_string()),
            id_token_signed_response_alg: Some(SignatureAlgorithm::HS256),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            client_secret_expires_at: None,
        };
        state
            .clients
            .persist(&client)
            .await
            .expect("Failed to persist client");

        let mut claims = Map::new();
        claims.insert("email".to_string(), json!("jane@example.org"));
        let user = User {
            dn: format!("inum=p-jane,{}", settings.base_dn.people),
            user_id: TEST_USER_ID.to_string(),
            claims,
        };
        state
            .users
            .persist(&user)
            .await
            .expect("Failed to persist user");

        Self {
            state,
            client,
            user,
            settings,
        }
    }
}

/// Sets up a logger for tests that can be called multiple times
pub fn setup_test_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Answers the first `misses` reads with None, then serves the stored value.
///
/// Mimics a replicated cache that has not yet caught up with a write.
pub struct LaggingCache {
    inner: InMemoryCache,
    misses: usize,
    reads: AtomicUsize,
}

impl LaggingCache {
    pub fn new(misses: usize) -> Self {
        Self {
            inner: InMemoryCache::new(60, 16).expect("Failed to create cache"),
            misses,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of reads served so far, misses included
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CacheBackend for LaggingCache {
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.inner.set(key, value).await
    }

    async fn set_with_ttl<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.misses {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }
}
