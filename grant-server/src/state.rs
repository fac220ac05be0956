use crate::cache::{create_cache, Cache, CacheBackend, CacheError};
use crate::client::ClientService;
use crate::config::Settings;
use crate::grant::{AuthorizationGrantList, GrantContext, GrantService};
use crate::sector::SectorIdentifierService;
use crate::store::{DirectoryBackend, EntryManager};
use crate::token::id_token::IdTokenFactory;
use crate::token::signer::{DefaultJwtSigner, SigningError};
use crate::uma::{
    ClaimsGatheringRegistry, PolicyScriptRegistry, UmaNeedsInfoService, UmaPctService,
    UmaPermissionService, UmaResourceService, UmaRptService, UmaScopeService,
};
use crate::user::UserService;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to create cache: {0}")]
    Cache(#[from] CacheError),
    #[error("Failed to set up token signing: {0}")]
    Signing(#[from] SigningError),
}

/// Every service of the engine, wired against one directory and one cache
#[derive(Clone, Debug)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<Cache>,
    pub entry_manager: EntryManager,
    pub clients: ClientService,
    pub users: UserService,
    pub sectors: SectorIdentifierService,
    pub grant_service: GrantService,
    pub grants: AuthorizationGrantList,
    pub uma_scopes: UmaScopeService,
    pub uma_permissions: UmaPermissionService,
    pub uma_resources: UmaResourceService,
    pub uma_pct: UmaPctService,
    pub uma_rpt: UmaRptService,
    pub needs_info: UmaNeedsInfoService,
    pub claims_gathering: Arc<ClaimsGatheringRegistry>,
}

impl AppState {
    /// Creates the cache from the settings and wires the services against `backend`
    pub async fn new(
        settings: Settings,
        backend: Arc<dyn DirectoryBackend>,
    ) -> Result<Self, StateError> {
        let cache = create_cache(&settings).await?;
        Self::with_existing_cache(
            settings,
            cache,
            backend,
            PolicyScriptRegistry::new(),
            ClaimsGatheringRegistry::new(),
        )
    }

    pub fn with_existing_cache(
        settings: Settings,
        cache: Cache,
        backend: Arc<dyn DirectoryBackend>,
        policies: PolicyScriptRegistry,
        claims_gathering: ClaimsGatheringRegistry,
    ) -> Result<Self, StateError> {
        let cache = Arc::new(cache);
        let entry_manager = EntryManager::new(backend);
        let base_dn = &settings.base_dn;

        let clients = ClientService::new(entry_manager.clone(), base_dn.clients.clone());
        let users = UserService::new(entry_manager.clone(), base_dn.people.clone());
        let sectors =
            SectorIdentifierService::new(entry_manager.clone(), base_dn.sector_identifiers.clone());
        let grant_service = GrantService::new(entry_manager.clone(), base_dn.clients.clone());

        let id_token_factory =
            IdTokenFactory::from_settings(&settings, Arc::new(DefaultJwtSigner))?;
        let grant_context = Arc::new(GrantContext {
            grant_service: grant_service.clone(),
            cache: Arc::clone(&cache),
            id_token_factory: Arc::new(id_token_factory),
            tokens: settings.tokens.clone(),
        });
        let grants = AuthorizationGrantList::new(grant_context, clients.clone(), users.clone());

        let uma_scopes = UmaScopeService::new(entry_manager.clone(), &base_dn.uma_base);
        let uma_permissions = UmaPermissionService::new(
            entry_manager.clone(),
            uma_scopes.clone(),
            base_dn.clients.clone(),
            settings.uma.ticket_lifetime,
        );
        let uma_resources =
            UmaResourceService::new(entry_manager.clone(), Arc::clone(&cache), &base_dn.uma_base);
        let uma_pct = UmaPctService::new(
            entry_manager.clone(),
            &base_dn.uma_base,
            settings.uma.pct_lifetime,
        );
        let uma_rpt = UmaRptService::new(
            entry_manager.clone(),
            clients.clone(),
            base_dn.clients.clone(),
            settings.uma.rpt_lifetime,
        );
        let needs_info = UmaNeedsInfoService::new(
            uma_permissions.clone(),
            uma_resources.clone(),
            Arc::new(policies),
            settings.issuer.clone(),
            settings.uma.gathering_endpoint(),
        );

        Ok(Self {
            settings: Arc::new(settings),
            cache,
            entry_manager,
            clients,
            users,
            sectors,
            grant_service,
            grants,
            uma_scopes,
            uma_permissions,
            uma_resources,
            uma_pct,
            uma_rpt,
            needs_info,
            claims_gathering: Arc::new(claims_gathering),
        })
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> bool {
        match self.cache.health_check().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cache health check failed: {}", e);
                false
            }
        }
    }
}
