use super::{CacheGrant, GrantError, GrantService, GrantType, PersistenceMode, TokenRecord};
use crate::cache::{Cache, CacheBackend};
use crate::client::Client;
use crate::config::TokenConfig;
use crate::token::id_token::{IdTokenFactory, IdTokenRequest};
use crate::token::{AccessToken, AuthorizationCode, IdToken, RefreshToken, Token, TokenType};
use crate::user::User;
use chrono::{DateTime, Utc};
use log::{debug, error, trace};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators shared by every grant
#[derive(Debug)]
pub struct GrantContext {
    pub grant_service: GrantService,
    pub cache: Arc<Cache>,
    pub id_token_factory: Arc<IdTokenFactory>,
    pub tokens: TokenConfig,
}

/// Grant type together with the state only that type carries
#[derive(Debug, Clone, PartialEq)]
pub enum GrantKind {
    AuthorizationCode { code: Option<AuthorizationCode> },
    Implicit,
    ClientCredentials,
    ResourceOwnerPasswordCredentials,
}

impl GrantKind {
    pub fn for_type(grant_type: GrantType) -> Self {
        match grant_type {
            GrantType::AuthorizationCode => Self::AuthorizationCode { code: None },
            GrantType::Implicit => Self::Implicit,
            GrantType::ClientCredentials => Self::ClientCredentials,
            GrantType::ResourceOwnerPasswordCredentials => Self::ResourceOwnerPasswordCredentials,
        }
    }

    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::Implicit => GrantType::Implicit,
            Self::ClientCredentials => GrantType::ClientCredentials,
            Self::ResourceOwnerPasswordCredentials => GrantType::ResourceOwnerPasswordCredentials,
        }
    }
}

/// ACR and session an ID token is issued under
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticationContext {
    pub acr_values: Option<String>,
    pub session_dn: Option<String>,
}

/// One OAuth grant and the tokens issued from it
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    kind: GrantKind,
    grant_id: String,
    client: Client,
    user: Option<User>,
    authentication_time: Option<DateTime<Utc>>,
    nonce: Option<String>,
    scopes: BTreeSet<String>,
    acr_values: Option<String>,
    session_dn: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    jwt_request: Option<String>,
    claims: Option<String>,
    id_token: Option<IdToken>,
    long_lived_access_token: Option<AccessToken>,
    access_tokens: Vec<AccessToken>,
    refresh_tokens: Vec<RefreshToken>,
    token_record: Option<TokenRecord>,
    persistence: PersistenceMode,
    ctx: Arc<GrantContext>,
}

impl AuthorizationGrant {
    pub(crate) fn new(
        kind: GrantKind,
        user: Option<User>,
        client: Client,
        authentication_time: Option<DateTime<Utc>>,
        ctx: Arc<GrantContext>,
    ) -> Self {
        let persistence =
            PersistenceMode::resolve(kind.grant_type(), ctx.tokens.use_cache_for_implicit_flow);
        Self {
            kind,
            grant_id: GrantService::generate_grant_id(),
            client,
            user,
            authentication_time,
            nonce: None,
            scopes: BTreeSet::new(),
            acr_values: None,
            session_dn: None,
            code_challenge: None,
            code_challenge_method: None,
            jwt_request: None,
            claims: None,
            id_token: None,
            long_lived_access_token: None,
            access_tokens: Vec::new(),
            refresh_tokens: Vec::new(),
            token_record: None,
            persistence,
            ctx,
        }
    }

    pub(crate) fn from_cache_grant(cached: CacheGrant, ctx: Arc<GrantContext>) -> Self {
        let kind = match cached.grant_type {
            GrantType::AuthorizationCode => GrantKind::AuthorizationCode {
                code: cached.authorization_code,
            },
            other => GrantKind::for_type(other),
        };
        let mut grant = Self::new(
            kind,
            cached.user,
            cached.client,
            cached.authentication_time,
            ctx,
        );
        grant.grant_id = cached.grant_id;
        grant.nonce = cached.nonce;
        grant.scopes = cached.scopes.into_iter().collect();
        grant.acr_values = cached.acr_values;
        grant.session_dn = cached.session_dn;
        grant.code_challenge = cached.code_challenge;
        grant.code_challenge_method = cached.code_challenge_method;
        grant.jwt_request = cached.jwt_request;
        grant.claims = cached.claims;
        grant.persistence = if grant.grant_type() == GrantType::AuthorizationCode {
            PersistenceMode::CacheOnly
        } else {
            PersistenceMode::ImplicitCache
        };
        grant
    }

    pub fn to_cache_grant(&self) -> CacheGrant {
        CacheGrant {
            grant_id: self.grant_id.clone(),
            grant_type: self.grant_type(),
            client: self.client.clone(),
            user: self.user.clone(),
            authentication_time: self.authentication_time,
            authorization_code: self.authorization_code().cloned(),
            nonce: self.nonce.clone(),
            scopes: self.scopes.iter().cloned().collect(),
            acr_values: self.acr_values.clone(),
            session_dn: self.session_dn.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            jwt_request: self.jwt_request.clone(),
            claims: self.claims.clone(),
        }
    }

    pub fn kind(&self) -> &GrantKind {
        &self.kind
    }

    pub fn grant_type(&self) -> GrantType {
        self.kind.grant_type()
    }

    pub fn grant_id(&self) -> &str {
        &self.grant_id
    }

    pub(crate) fn set_grant_id(&mut self, grant_id: String) {
        self.grant_id = grant_id;
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }

    pub fn authentication_time(&self) -> Option<DateTime<Utc>> {
        self.authentication_time
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn set_nonce(&mut self, nonce: Option<String>) {
        self.nonce = nonce;
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn set_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
    }

    /// Scopes joined by single spaces
    pub fn scopes_as_string(&self) -> String {
        self.scopes.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    pub fn acr_values(&self) -> Option<&str> {
        self.acr_values.as_deref()
    }

    pub fn set_acr_values(&mut self, acr_values: Option<String>) {
        self.acr_values = acr_values;
    }

    pub fn session_dn(&self) -> Option<&str> {
        self.session_dn.as_deref()
    }

    pub fn set_session_dn(&mut self, session_dn: Option<String>) {
        self.session_dn = session_dn;
    }

    pub fn authentication_context(&self) -> AuthenticationContext {
        AuthenticationContext {
            acr_values: self.acr_values.clone(),
            session_dn: self.session_dn.clone(),
        }
    }

    pub fn code_challenge(&self) -> Option<&str> {
        self.code_challenge.as_deref()
    }

    pub fn code_challenge_method(&self) -> Option<&str> {
        self.code_challenge_method.as_deref()
    }

    /// PKCE challenge and its method
    pub fn set_code_challenge(&mut self, challenge: Option<String>, method: Option<String>) {
        self.code_challenge = challenge;
        self.code_challenge_method = method;
    }

    /// Encoded JWT authorization request
    pub fn jwt_request(&self) -> Option<&str> {
        self.jwt_request.as_deref()
    }

    pub fn set_jwt_request(&mut self, jwt_request: Option<String>) {
        self.jwt_request = jwt_request;
    }

    /// Requested claims, as sent in the `claims` parameter
    pub fn claims(&self) -> Option<&str> {
        self.claims.as_deref()
    }

    pub fn set_claims(&mut self, claims: Option<String>) {
        self.claims = claims;
    }

    pub fn authorization_code(&self) -> Option<&AuthorizationCode> {
        match &self.kind {
            GrantKind::AuthorizationCode { code } => code.as_ref(),
            _ => None,
        }
    }

    /// Attaches `code`; ignored by grants that are not authorization code grants
    pub fn set_authorization_code(&mut self, new_code: AuthorizationCode) {
        match &mut self.kind {
            GrantKind::AuthorizationCode { code } => *code = Some(new_code),
            other => debug!("Ignoring authorization code for {} grant", other.grant_type()),
        }
    }

    pub fn id_token(&self) -> Option<&IdToken> {
        self.id_token.as_ref()
    }

    pub(crate) fn set_id_token(&mut self, id_token: IdToken) {
        self.id_token = Some(id_token);
    }

    pub fn long_lived_access_token(&self) -> Option<&AccessToken> {
        self.long_lived_access_token.as_ref()
    }

    pub(crate) fn set_long_lived_access_token(&mut self, token: AccessToken) {
        self.long_lived_access_token = Some(token);
    }

    pub fn access_tokens(&self) -> &[AccessToken] {
        &self.access_tokens
    }

    pub(crate) fn set_access_tokens(&mut self, tokens: Vec<AccessToken>) {
        self.access_tokens = tokens;
    }

    pub fn refresh_tokens(&self) -> &[RefreshToken] {
        &self.refresh_tokens
    }

    pub(crate) fn set_refresh_tokens(&mut self, tokens: Vec<RefreshToken>) {
        self.refresh_tokens = tokens;
    }

    /// Row this grant was rebuilt from, if any
    pub fn token_record(&self) -> Option<&TokenRecord> {
        self.token_record.as_ref()
    }

    pub(crate) fn set_token_record(&mut self, record: TokenRecord) {
        self.token_record = Some(record);
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        self.persistence
    }

    /// Keeps the grant in the cache only, without directory rows.
    ///
    /// Only authorization code grants can live in the cache alone.
    pub fn set_cached_with_no_persistence(&mut self) -> Result<(), GrantError> {
        if self.grant_type() != GrantType::AuthorizationCode {
            return Err(GrantError::UnsupportedCaching(self.grant_type()));
        }
        self.persistence = PersistenceMode::CacheOnly;
        Ok(())
    }

    /// Always true: token expiry is enforced by lookups and the cleanup sweep
    pub fn is_valid(&self) -> bool {
        true
    }

    /// Directory row for `token`, carrying a snapshot of the grant
    pub fn as_record(&self, token: &Token, token_type: TokenType) -> TokenRecord {
        let id = GrantService::generate_grant_id();
        TokenRecord {
            dn: self
                .ctx
                .grant_service
                .build_dn(&id, &self.grant_id, self.client_id()),
            id,
            grant_id: self.grant_id.clone(),
            creation_date: token.creation_date,
            expiration_date: token.expiration_date,
            token_code: token.stored_code(),
            token_type,
            grant_type: self.grant_type().as_str().to_string(),
            client_id: self.client_id().to_string(),
            user_id: self.user_id().map(str::to_string),
            scope: self.scopes_as_string(),
            auth_mode: token.auth_mode.clone(),
            session_dn: token.session_dn.clone(),
            authentication_time: self.authentication_time,
            authorization_code: self
                .authorization_code()
                .map(|code| code.stored_code()),
            nonce: self.nonce.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            jwt_request: self.jwt_request.clone().filter(|jwt| !jwt.trim().is_empty()),
            claims: self.claims.clone(),
        }
    }

    fn new_token(&self, lifetime_secs: i64) -> Token {
        let mut token = Token::generate(lifetime_secs);
        token.auth_mode = self.acr_values.clone();
        token.session_dn = self.session_dn.clone();
        token
    }

    /// Persists a row for `token` unless it is already expired
    async fn persist_if_live(
        &self,
        token: &Token,
        token_type: TokenType,
    ) -> Result<(), GrantError> {
        if token.expires_in() > 0 {
            let record = self.as_record(token, token_type);
            if let Err(e) = self.ctx.grant_service.persist(&record).await {
                error!(
                    "Failed to persist {} of grant {}: {}",
                    token_type, self.grant_id, e
                );
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub async fn create_access_token(&mut self) -> Result<AccessToken, GrantError> {
        let token = AccessToken(self.new_token(self.ctx.tokens.access_token_lifetime));
        self.persist_if_live(&token, TokenType::AccessToken).await?;
        self.access_tokens.push(token.clone());
        Ok(token)
    }

    pub async fn create_long_lived_access_token(&mut self) -> Result<AccessToken, GrantError> {
        let token = AccessToken(self.new_token(self.ctx.tokens.long_lived_access_token_lifetime));
        self.persist_if_live(&token, TokenType::LongLivedAccessToken).await?;
        self.long_lived_access_token = Some(token.clone());
        Ok(token)
    }

    pub async fn create_refresh_token(&mut self) -> Result<RefreshToken, GrantError> {
        let token = RefreshToken(self.new_token(self.ctx.tokens.refresh_token_lifetime));
        self.persist_if_live(&token, TokenType::RefreshToken).await?;
        self.refresh_tokens.push(token.clone());
        Ok(token)
    }

    /// Signs a new ID token, persists it, then adopts the ACR and session of
    /// `authentication` and saves the grant.
    pub async fn create_id_token(
        &mut self,
        nonce: Option<&str>,
        authorization_code: Option<&AuthorizationCode>,
        access_token: Option<&AccessToken>,
        authentication: AuthenticationContext,
        include_id_token_claims: bool,
    ) -> Result<IdToken, GrantError> {
        let request = IdTokenRequest {
            client: &self.client,
            user: self.user.as_ref(),
            authentication_time: self.authentication_time,
            nonce,
            acr: authentication.acr_values.as_deref(),
            session_dn: authentication.session_dn.as_deref(),
            authorization_code,
            access_token,
            include_user_claims: include_id_token_claims,
        };
        let id_token = self.ctx.id_token_factory.create(&request).map_err(|e| {
            error!("Failed to create ID token for grant {}: {}", self.grant_id, e);
            GrantError::from(e)
        })?;

        if id_token.expires_in() > 0 {
            let mut record = self.as_record(&id_token, TokenType::IdToken);
            record.auth_mode = authentication.acr_values.clone();
            record.session_dn = authentication.session_dn.clone();
            self.ctx.grant_service.persist(&record).await?;
        }

        self.acr_values = authentication.acr_values;
        self.session_dn = authentication.session_dn;
        self.id_token = Some(id_token.clone());
        self.save().await?;
        Ok(id_token)
    }

    /// Grants the requested scopes the client is allowed, then saves
    pub async fn check_scopes_policy(&mut self, requested: &str) -> Result<String, GrantError> {
        let allowed: HashSet<&str> = self.client.scopes.iter().map(String::as_str).collect();
        self.scopes = requested
            .split_whitespace()
            .filter(|scope| allowed.contains(scope))
            .map(str::to_string)
            .collect();
        self.save().await?;
        Ok(self.scopes_as_string())
    }

    /// Writes the grant according to its persistence mode
    pub async fn save(&self) -> Result<(), GrantError> {
        match self.persistence {
            PersistenceMode::CacheOnly => {
                if self.grant_type() != GrantType::AuthorizationCode {
                    return Err(GrantError::UnsupportedCaching(self.grant_type()));
                }
                self.save_in_cache().await
            }
            PersistenceMode::ImplicitCache => self.save_in_cache().await,
            PersistenceMode::Durable => self.save_rows().await,
        }
    }

    async fn save_in_cache(&self) -> Result<(), GrantError> {
        let cached = self.to_cache_grant();
        let expires_in = cached.expires_in(self.ctx.tokens.access_token_lifetime);
        if expires_in <= 0 {
            debug!("Grant {} already expired, not caching it", self.grant_id);
            return Ok(());
        }
        self.ctx
            .cache
            .set_with_ttl(
                &cached.key(),
                &cached,
                Duration::from_secs(expires_in as u64),
            )
            .await?;
        trace!("Cached grant {} for {}s", self.grant_id, expires_in);
        Ok(())
    }

    /// Rewrites the mutable fields of every row sharing the grant id.
    ///
    /// Rows are merged one by one; a failing row is logged and the rest still
    /// get written.
    async fn save_rows(&self) -> Result<(), GrantError> {
        if self.grant_id.trim().is_empty() {
            return Ok(());
        }
        let records = self
            .ctx
            .grant_service
            .get_grants_by_grant_id(&self.grant_id)
            .await?;
        let scope = self.scopes_as_string();
        for mut record in records {
            record.nonce = self.nonce.clone();
            record.scope = scope.clone();
            record.auth_mode = self.acr_values.clone();
            record.session_dn = self.session_dn.clone();
            record.authentication_time = self.authentication_time;
            record.code_challenge = self.code_challenge.clone();
            record.code_challenge_method = self.code_challenge_method.clone();
            record.claims = self.claims.clone();
            if let Some(jwt) = self.jwt_request.as_ref().filter(|jwt| !jwt.trim().is_empty()) {
                record.jwt_request = Some(jwt.clone());
            }
            debug!(
                "Saving grant {}, code_challenge: {:?}",
                self.grant_id, self.code_challenge
            );
            self.ctx.grant_service.merge_silently(&record).await;
        }
        Ok(())
    }

    /// Removes every row of the grant. A grant without a persisted grant id is left alone.
    pub async fn revoke_all_tokens(&self) -> Result<usize, GrantError> {
        let grant_id = self
            .token_record
            .as_ref()
            .map(|record| record.grant_id.as_str())
            .unwrap_or(self.grant_id.as_str());
        if grant_id.trim().is_empty() {
            return Ok(0);
        }
        Ok(self.ctx.grant_service.remove_all_by_grant_id(grant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestFixture;
    use crate::token::codec;

    #[tokio::test]
    async fn test_access_token_persisted_with_hashed_code() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture
            .state
            .grants
            .create_client_credentials_grant(None, fixture.client.clone());
        grant.set_scopes(["openid", "profile"]);

        let token = grant.create_access_token().await.unwrap();
        let record = fixture
            .state
            .grant_service
            .get_grant_by_code(&token.code)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.token_code, codec::hash_code(&token.code));
        assert_ne!(record.token_code, token.code);
        assert_eq!(record.grant_id, grant.grant_id());
        assert_eq!(record.token_type, TokenType::AccessToken);
        assert_eq!(record.scope, "openid profile");
        assert_eq!(record.grant_type, "client_credentials");
        assert_eq!(grant.access_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_lifetime_tokens_are_not_persisted() {
        let fixture = TestFixture::new_with(|settings| {
            settings.tokens.refresh_token_lifetime = 0;
        })
        .await;
        let mut grant = fixture
            .state
            .grants
            .create_resource_owner_password_credentials_grant(
                Some(fixture.user.clone()),
                fixture.client.clone(),
            );

        let refresh = grant.create_refresh_token().await.unwrap();
        assert_eq!(refresh.expires_in(), 0);
        assert!(fixture
            .state
            .grant_service
            .get_grants_by_grant_id(grant.grant_id())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_save_fans_out_to_every_row() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture
            .state
            .grants
            .create_implicit_grant(Some(fixture.user.clone()), fixture.client.clone(), None);
        grant.set_scopes(["openid"]);
        let access = grant.create_access_token().await.unwrap();
        let refresh = grant.create_refresh_token().await.unwrap();
        grant.create_access_token().await.unwrap();

        grant.set_nonce(Some("n-2".to_string()));
        grant.set_acr_values(Some("otp".to_string()));
        grant.set_scopes(["openid", "email"]);
        grant.save().await.unwrap();

        let rows = fixture
            .state
            .grant_service
            .get_grants_by_grant_id(grant.grant_id())
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.scope, "email openid");
            assert_eq!(row.nonce.as_deref(), Some("n-2"));
            assert_eq!(row.auth_mode.as_deref(), Some("otp"));
        }

        for code in [&access.code, &refresh.code] {
            let rebuilt = fixture
                .state
                .grants
                .load(&fixture.client.client_id, code)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(rebuilt.scopes(), grant.scopes());
            assert_eq!(rebuilt.grant_id(), grant.grant_id());
        }
    }

    #[tokio::test]
    async fn test_check_scopes_policy_keeps_allowed_scopes_and_saves() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture
            .state
            .grants
            .create_implicit_grant(Some(fixture.user.clone()), fixture.client.clone(), None);
        grant.set_scopes(["openid"]);
        grant.create_access_token().await.unwrap();

        let granted = grant
            .check_scopes_policy("openid admin profile")
            .await
            .unwrap();
        assert_eq!(granted, "openid profile");

        let rows = fixture
            .state
            .grant_service
            .get_grants_by_grant_id(grant.grant_id())
            .await
            .unwrap();
        assert_eq!(rows[0].scope, "openid profile");
    }

    #[tokio::test]
    async fn test_cache_only_rejected_for_other_grant_types() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture
            .state
            .grants
            .create_client_credentials_grant(None, fixture.client.clone());
        assert!(matches!(
            grant.set_cached_with_no_persistence(),
            Err(GrantError::UnsupportedCaching(GrantType::ClientCredentials))
        ));
        assert_eq!(grant.persistence_mode(), PersistenceMode::Durable);
    }

    #[tokio::test]
    async fn test_implicit_flow_caching() {
        let fixture = TestFixture::new_with(|settings| {
            settings.tokens.use_cache_for_implicit_flow = true;
        })
        .await;
        let mut grant = fixture
            .state
            .grants
            .create_implicit_grant(Some(fixture.user.clone()), fixture.client.clone(), None);
        assert_eq!(grant.persistence_mode(), PersistenceMode::ImplicitCache);

        grant.set_scopes(["openid"]);
        grant.save().await.unwrap();
        let cached: Option<CacheGrant> = fixture.state.cache.get(grant.grant_id()).await.unwrap();
        assert_eq!(cached.unwrap().scopes, vec!["openid".to_string()]);
    }

    #[tokio::test]
    async fn test_id_token_adopts_authentication_context() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture.state.grants.create_authorization_grant(
            Some(fixture.user.clone()),
            fixture.client.clone(),
            Some(Utc::now()),
        );
        grant.set_scopes(["openid"]);
        let access = grant.create_access_token().await.unwrap();

        let id_token = grant
            .create_id_token(
                Some("nonce-1"),
                None,
                Some(&access),
                AuthenticationContext {
                    acr_values: Some("u2f".to_string()),
                    session_dn: Some("uniqueIdentifier=s1,ou=session,o=test".to_string()),
                },
                true,
            )
            .await
            .unwrap();

        assert_eq!(grant.acr_values(), Some("u2f"));
        assert_eq!(grant.id_token(), Some(&id_token));
        let by_id_token = fixture
            .state
            .grants
            .get_authorization_grant_by_id_token(&id_token.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id_token.acr_values(), Some("u2f"));
        assert_eq!(
            by_id_token.session_dn(),
            Some("uniqueIdentifier=s1,ou=session,o=test")
        );
    }

    #[tokio::test]
    async fn test_revoke_all_tokens() {
        let fixture = TestFixture::new().await;
        let mut grant = fixture
            .state
            .grants
            .create_client_credentials_grant(None, fixture.client.clone());
        let access = grant.create_access_token().await.unwrap();
        grant.create_refresh_token().await.unwrap();

        assert_eq!(grant.revoke_all_tokens().await.unwrap(), 2);
        assert!(fixture
            .state
            .grants
            .get_authorization_grant_by_access_token(&access.code)
            .await
            .unwrap()
            .is_none());
        assert!(grant.is_valid());
    }
}
