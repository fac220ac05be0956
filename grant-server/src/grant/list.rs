use super::{
    AuthorizationGrant, CacheGrant, GrantContext, GrantError, GrantKind, GrantType, TokenRecord,
};
use crate::cache::{get_with_single_retry, CacheBackend, CacheError};
use crate::client::{Client, ClientService};
use crate::store::dn;
use crate::token::{AccessToken, AuthorizationCode, IdToken, RefreshToken, TokenType};
use crate::user::{User, UserService};
use chrono::{DateTime, Utc};
use log::{trace, warn};
use std::sync::Arc;

/// Factory and lookup registry for grants.
///
/// Grants are only ever rebuilt from cached or stored state through this type.
#[derive(Debug, Clone)]
pub struct AuthorizationGrantList {
    ctx: Arc<GrantContext>,
    client_service: ClientService,
    user_service: UserService,
}

/// Reads the cached code grant of `(client_id, code)`, retrying once on a miss
pub async fn fetch_code_grant<C: CacheBackend>(
    cache: &C,
    client_id: &str,
    code: &str,
) -> Result<Option<CacheGrant>, CacheError> {
    let key = CacheGrant::cache_key(client_id, code);
    let cached = get_with_single_retry(cache, &key).await?;
    if cached.is_none() {
        trace!(
            "Failed to fetch authorization grant from cache, code: {}, clientId: {}",
            code,
            client_id
        );
    }
    Ok(cached)
}

impl AuthorizationGrantList {
    pub fn new(
        ctx: Arc<GrantContext>,
        client_service: ClientService,
        user_service: UserService,
    ) -> Self {
        Self {
            ctx,
            client_service,
            user_service,
        }
    }

    pub fn context(&self) -> &Arc<GrantContext> {
        &self.ctx
    }

    /// Grant without a specific flow; handled like an implicit grant
    pub fn create_authorization_grant(
        &self,
        user: Option<User>,
        client: Client,
        authentication_time: Option<DateTime<Utc>>,
    ) -> AuthorizationGrant {
        AuthorizationGrant::new(
            GrantKind::Implicit,
            user,
            client,
            authentication_time,
            self.ctx.clone(),
        )
    }

    /// New code grant, written straight to the cache under `(client_id, code)`
    /// for as long as the code lives
    pub async fn create_authorization_code_grant(
        &self,
        user: Option<User>,
        client: Client,
        authentication_time: Option<DateTime<Utc>>,
    ) -> Result<AuthorizationGrant, GrantError> {
        let code = AuthorizationCode::generate(self.ctx.tokens.authorization_code_lifetime);
        let mut grant = AuthorizationGrant::new(
            GrantKind::AuthorizationCode { code: Some(code) },
            user,
            client,
            authentication_time,
            self.ctx.clone(),
        );
        grant.set_cached_with_no_persistence()?;
        grant.save().await?;
        trace!(
            "Put authorization grant in cache, code: {:?}, clientId: {}",
            grant.authorization_code().map(|c| c.code.as_str()),
            grant.client_id()
        );
        Ok(grant)
    }

    pub fn create_implicit_grant(
        &self,
        user: Option<User>,
        client: Client,
        authentication_time: Option<DateTime<Utc>>,
    ) -> AuthorizationGrant {
        AuthorizationGrant::new(
            GrantKind::Implicit,
            user,
            client,
            authentication_time,
            self.ctx.clone(),
        )
    }

    pub fn create_client_credentials_grant(
        &self,
        user: Option<User>,
        client: Client,
    ) -> AuthorizationGrant {
        AuthorizationGrant::new(
            GrantKind::ClientCredentials,
            user,
            client,
            None,
            self.ctx.clone(),
        )
    }

    pub fn create_resource_owner_password_credentials_grant(
        &self,
        user: Option<User>,
        client: Client,
    ) -> AuthorizationGrant {
        AuthorizationGrant::new(
            GrantKind::ResourceOwnerPasswordCredentials,
            user,
            client,
            None,
            self.ctx.clone(),
        )
    }

    /// Code grant from the cache. There is no fallback to the directory.
    pub async fn get_authorization_code_grant(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        let cached = fetch_code_grant(self.ctx.cache.as_ref(), client_id, code).await?;
        Ok(cached.map(|cached| AuthorizationGrant::from_cache_grant(cached, self.ctx.clone())))
    }

    pub async fn get_authorization_grant_by_refresh_token(
        &self,
        client_id: &str,
        refresh_token_code: &str,
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        self.load(client_id, refresh_token_code).await
    }

    pub async fn get_authorization_grant_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        self.find_by_code(
            access_token,
            &[TokenType::AccessToken, TokenType::LongLivedAccessToken],
        )
        .await
    }

    pub async fn get_authorization_grant_by_id_token(
        &self,
        id_token: &str,
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        self.find_by_code(id_token, &[TokenType::IdToken]).await
    }

    async fn find_by_code(
        &self,
        code: &str,
        accepted: &[TokenType],
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        match self.ctx.grant_service.get_grant_by_code(code).await? {
            Some(record) if accepted.contains(&record.token_type) => {
                Ok(Some(self.as_grant(record).await?))
            }
            _ => Ok(None),
        }
    }

    /// Grant owning the live row of `code` issued to `client_id`
    pub async fn load(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<Option<AuthorizationGrant>, GrantError> {
        match self
            .ctx
            .grant_service
            .get_grant_by_code_and_client(code, client_id)
            .await?
        {
            Some(record) => Ok(Some(self.as_grant(record).await?)),
            None => Ok(None),
        }
    }

    /// One grant per stored row of the client; rows that cannot be rebuilt are skipped
    pub async fn get_authorization_grants(
        &self,
        client_id: &str,
    ) -> Result<Vec<AuthorizationGrant>, GrantError> {
        let records = self.ctx.grant_service.get_grants_of_client(client_id).await?;
        let mut result = Vec::with_capacity(records.len());
        for record in records {
            let dn = record.dn.clone();
            match self.as_grant(record).await {
                Ok(grant) => result.push(grant),
                Err(e) => warn!("Skipping token row {}: {}", dn, e),
            }
        }
        Ok(result)
    }

    /// Removes every row of each grant, returning the number of rows removed
    pub async fn remove_authorization_grants(
        &self,
        grants: &[AuthorizationGrant],
    ) -> Result<usize, GrantError> {
        let mut removed = 0;
        for grant in grants {
            removed += grant.revoke_all_tokens().await?;
        }
        Ok(removed)
    }

    pub fn extract_client_id_from_token_dn(token_dn: &str) -> String {
        dn::extract_client_id_from_token_dn(token_dn)
    }

    /// Rebuilds the grant a stored row belongs to.
    ///
    /// The row's token is placed in the slot matching its token type.
    pub async fn as_grant(&self, record: TokenRecord) -> Result<AuthorizationGrant, GrantError> {
        let grant_type: GrantType = record.grant_type.parse()?;

        let user = match record.user_id.as_deref() {
            Some(user_id) => self.user_service.get_user(user_id).await?,
            None => None,
        };
        let client_id = Self::extract_client_id_from_token_dn(&record.dn);
        let client = self
            .client_service
            .get_client(&client_id)
            .await?
            .ok_or(GrantError::ClientNotFound(client_id))?;

        let mut grant = AuthorizationGrant::new(
            GrantKind::for_type(grant_type),
            user,
            client,
            record.authentication_time,
            self.ctx.clone(),
        );
        if !record.grant_id.trim().is_empty() {
            grant.set_grant_id(record.grant_id.clone());
        }
        grant.set_nonce(record.nonce.clone());
        grant.set_scopes(record.scope.split_whitespace());
        grant.set_code_challenge(
            record.code_challenge.clone(),
            record.code_challenge_method.clone(),
        );
        grant.set_jwt_request(
            record
                .jwt_request
                .clone()
                .filter(|jwt| !jwt.trim().is_empty()),
        );
        grant.set_claims(record.claims.clone());
        grant.set_acr_values(record.auth_mode.clone());
        grant.set_session_dn(record.session_dn.clone());

        let token = record.to_token();
        match record.token_type {
            TokenType::AuthorizationCode => grant.set_authorization_code(AuthorizationCode(token)),
            TokenType::RefreshToken => grant.set_refresh_tokens(vec![RefreshToken(token)]),
            TokenType::AccessToken => grant.set_access_tokens(vec![AccessToken(token)]),
            TokenType::IdToken => grant.set_id_token(IdToken(token)),
            TokenType::LongLivedAccessToken => grant.set_long_lived_access_token(AccessToken(token)),
        }
        grant.set_token_record(record);
        Ok(grant)
    }
}
