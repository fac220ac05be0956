use super::permission::{UmaPermission, PCT};
use crate::store::{dn, Entry, EntryManager, Filter, StoreError, SweepReport};
use crate::token::codec;
use chrono::{DateTime, Duration, Utc};
use log::{error, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TOKEN_CODE: &str = "tokenCode";
const EXPIRATION_DATE: &str = "expirationDate";
const DEFAULT_PCT_LIFETIME: i64 = 3600;

/// Persisted claims token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmaPct {
    pub dn: String,
    #[serde(rename = "tokenCode")]
    pub code: String,
    pub creation_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub client_id: String,
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Entry for UmaPct {
    const OBJECT_CLASS: &'static str = "umaPct";

    fn dn(&self) -> &str {
        &self.dn
    }
}

impl UmaPct {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }
}

#[derive(Debug, Clone)]
pub struct UmaPctService {
    entry_manager: EntryManager,
    base_dn: String,
    lifetime: i64,
}

impl UmaPctService {
    pub fn new(entry_manager: EntryManager, uma_base_dn: &str, lifetime: i64) -> Self {
        Self {
            entry_manager,
            base_dn: format!("ou=pct,{}", uma_base_dn),
            lifetime,
        }
    }

    pub fn branch_dn(&self) -> &str {
        &self.base_dn
    }

    /// Lifetime in seconds, 3600 unless configured to a positive value
    pub fn pct_lifetime(&self) -> i64 {
        if self.lifetime <= 0 {
            DEFAULT_PCT_LIFETIME
        } else {
            self.lifetime
        }
    }

    pub fn build_dn(&self, code: &str) -> Result<String, StoreError> {
        if code.trim().is_empty() {
            return Err(StoreError::InvalidDn("PCT code is blank".to_string()));
        }
        Ok(format!("tokenCode={},{}", dn::escape(code), self.base_dn))
    }

    /// New PCT for `client_id`, not yet persisted
    pub fn create_pct(&self, client_id: &str) -> Result<UmaPct, StoreError> {
        let code = codec::generate_uma_code();
        let creation_date = Utc::now();
        Ok(UmaPct {
            dn: self.build_dn(&code)?,
            code,
            creation_date,
            expiration_date: creation_date + Duration::seconds(self.pct_lifetime()),
            client_id: client_id.to_string(),
            claims: Map::new(),
        })
    }

    pub async fn create_pct_and_persist(&self, client_id: &str) -> Result<UmaPct, StoreError> {
        let pct = self.create_pct(client_id)?;
        self.persist(&pct).await?;
        Ok(pct)
    }

    pub async fn persist(&self, pct: &UmaPct) -> Result<(), StoreError> {
        self.entry_manager.ensure_branch("pct", &self.base_dn).await?;
        self.entry_manager.persist(pct).await
    }

    pub async fn merge(&self, pct: &UmaPct) -> Result<(), StoreError> {
        self.entry_manager.merge(pct).await
    }

    /// Live PCT with `code`; an expired PCT is reported as missing
    pub async fn get_by_code(&self, code: &str) -> Result<Option<UmaPct>, StoreError> {
        Ok(self
            .find_by_code(code)
            .await?
            .filter(|pct| !pct.is_expired(Utc::now())))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<UmaPct>, StoreError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        let mut entries: Vec<UmaPct> = self
            .entry_manager
            .find_entries(&self.base_dn, &Filter::equals(TOKEN_CODE, code))
            .await?;
        if entries.is_empty() {
            error!("Failed to find PCT by code: {}", code);
            return Ok(None);
        }
        Ok(Some(entries.swap_remove(0)))
    }

    pub async fn remove(&self, pct: &UmaPct) -> Result<(), StoreError> {
        self.entry_manager.remove(pct).await
    }

    /// Removes the PCT with `code`, returning whether one existed
    pub async fn remove_by_code(&self, code: &str) -> Result<bool, StoreError> {
        match self.find_by_code(code).await? {
            Some(pct) => {
                self.remove(&pct).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Folds the claims of the request into one PCT and stores it.
    ///
    /// The PCT bound to the ticket (`pct` attribute of the first permission) takes
    /// part in the merge:
    /// * without `pct`, the ticket PCT is used, or a new PCT is created;
    /// * with both, the ticket PCT claims are copied over the claims of `pct` and the
    ///   ticket PCT is the one returned, carrying the merged claims.
    ///
    /// `id_token_claims` are applied last and win over existing claims. Failures are
    /// logged; the best PCT at hand is returned either way.
    pub async fn update_claims(
        &self,
        pct: Option<UmaPct>,
        id_token_claims: Option<&Map<String, Value>>,
        client_id: &str,
        permissions: &[UmaPermission],
    ) -> Option<UmaPct> {
        let ticket_pct = match permissions.first().and_then(|p| p.attribute(PCT)) {
            Some(code) => match self.get_by_code(code).await {
                Ok(found) => found,
                Err(e) => {
                    error!("Failed to load ticket PCT {}: {}", code, e);
                    None
                }
            },
            None => None,
        };

        let mut result = match (pct, ticket_pct) {
            (Some(mut pct), Some(mut ticket_pct)) => {
                let ticket_claims = std::mem::take(&mut ticket_pct.claims);
                pct.claims.extend(ticket_claims);
                ticket_pct.claims = pct.claims;
                ticket_pct
            }
            (Some(pct), None) => pct,
            (None, Some(ticket_pct)) => ticket_pct,
            (None, None) => match self.create_pct_and_persist(client_id).await {
                Ok(created) => created,
                Err(e) => {
                    error!("Failed to create PCT for client {}: {}", client_id, e);
                    return None;
                }
            },
        };

        if let Some(claims) = id_token_claims {
            result
                .claims
                .extend(claims.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        trace!(
            "PCT code: {}, claims: {}",
            result.code,
            Value::Object(result.claims.clone())
        );
        if let Err(e) = self.merge(&result).await {
            error!("Failed to update PCT claims, code {}: {}", result.code, e);
        }
        Some(result)
    }

    /// Removes every PCT that expired at or before `now`
    pub async fn clean_up(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.entry_manager.ensure_branch("pct", &self.base_dn).await?;
        self.entry_manager
            .remove_matching::<UmaPct>(
                &self.base_dn,
                &Filter::less_or_equal(EXPIRATION_DATE, now),
                batch_size,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDirectory;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Arc;

    fn service() -> UmaPctService {
        UmaPctService::new(
            EntryManager::new(Arc::new(MemoryDirectory::new())),
            "ou=uma,o=test",
            0,
        )
    }

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn permission_with_pct(code: Option<&str>) -> UmaPermission {
        let mut attributes = BTreeMap::new();
        if let Some(code) = code {
            attributes.insert(PCT.to_string(), code.to_string());
        }
        UmaPermission {
            dn: "ticket=t1,ou=uma_permission,inum=c1,ou=clients,o=test".to_string(),
            ticket: "t1".to_string(),
            resource_id: "photos".to_string(),
            scope_dns: Vec::new(),
            configuration_code: "abc.1".to_string(),
            expiration_date: Utc::now() + Duration::seconds(60),
            attributes,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_lifetime_falls_back_to_default() {
        let service = service();
        assert_eq!(service.pct_lifetime(), 3600);
        let pct = service.create_pct("c1").unwrap();
        assert_eq!((pct.expiration_date - pct.creation_date).num_seconds(), 3600);
        assert!(pct.dn.starts_with("tokenCode="));
        assert!(service.build_dn(" ").is_err());
    }

    #[tokio::test]
    async fn test_codes_are_unique() {
        let service = service();
        let codes: HashSet<_> = (0..100)
            .map(|_| service.create_pct("c1").unwrap().code)
            .collect();
        assert_eq!(codes.len(), 100);
    }

    #[tokio::test]
    async fn test_claims_accumulate_across_calls() {
        let service = service();
        let permissions = vec![permission_with_pct(None)];

        let first = service
            .update_claims(
                None,
                Some(&claims(json!({"email": "a@example.org"}))),
                "c1",
                &permissions,
            )
            .await
            .unwrap();
        let second = service
            .update_claims(
                Some(first.clone()),
                Some(&claims(json!({"country": "NZ"}))),
                "c1",
                &permissions,
            )
            .await
            .unwrap();
        assert_eq!(second.code, first.code);
        assert_eq!(second.claims["email"], json!("a@example.org"));
        assert_eq!(second.claims["country"], json!("NZ"));

        let third = service
            .update_claims(
                Some(second),
                Some(&claims(json!({"email": "b@example.org"}))),
                "c1",
                &permissions,
            )
            .await
            .unwrap();
        assert_eq!(third.claims["email"], json!("b@example.org"));
        assert_eq!(third.claims["country"], json!("NZ"));

        let stored = service.get_by_code(&first.code).await.unwrap().unwrap();
        assert_eq!(stored.claims, third.claims);
    }

    #[tokio::test]
    async fn test_ticket_pct_is_returned_with_merged_claims() {
        let service = service();
        let mut ticket_pct = service.create_pct_and_persist("c1").await.unwrap();
        ticket_pct.claims = claims(json!({"country": "NZ", "email": "ticket@example.org"}));
        service.merge(&ticket_pct).await.unwrap();

        let mut passed = service.create_pct_and_persist("c1").await.unwrap();
        passed.claims = claims(json!({"email": "passed@example.org", "age": 40}));

        let permissions = vec![permission_with_pct(Some(&ticket_pct.code))];
        let merged = service
            .update_claims(Some(passed), None, "c1", &permissions)
            .await
            .unwrap();

        assert_eq!(merged.code, ticket_pct.code);
        assert_eq!(merged.claims["email"], json!("ticket@example.org"));
        assert_eq!(merged.claims["age"], json!(40));
        assert_eq!(merged.claims["country"], json!("NZ"));

        let only_ticket = service
            .update_claims(None, None, "c1", &permissions)
            .await
            .unwrap();
        assert_eq!(only_ticket.code, ticket_pct.code);
    }

    #[tokio::test]
    async fn test_remove_and_clean_up() {
        let service = service();
        let pct = service.create_pct_and_persist("c1").await.unwrap();
        assert!(service.remove_by_code(&pct.code).await.unwrap());
        assert!(!service.remove_by_code(&pct.code).await.unwrap());

        let mut expired = service.create_pct("c1").unwrap();
        expired.expiration_date = Utc::now() - Duration::seconds(1);
        service.persist(&expired).await.unwrap();
        let live = service.create_pct_and_persist("c1").await.unwrap();

        let now = Utc::now();
        assert_eq!(service.clean_up(now, 10).await.unwrap().removed, 1);
        assert_eq!(service.clean_up(now, 10).await.unwrap(), SweepReport::default());
        assert!(service.get_by_code(&live.code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_pct_looks_missing() {
        let service = service();
        let mut expired = service.create_pct("c1").unwrap();
        expired.expiration_date = Utc::now() - Duration::seconds(60);
        expired.claims = claims(json!({"email": "old@example.org"}));
        service.persist(&expired).await.unwrap();

        assert!(service.get_by_code(&expired.code).await.unwrap().is_none());

        // an expired ticket PCT is not merged; a new PCT takes its place
        let permissions = vec![permission_with_pct(Some(&expired.code))];
        let fresh = service
            .update_claims(None, None, "c1", &permissions)
            .await
            .unwrap();
        assert_ne!(fresh.code, expired.code);
        assert!(!fresh.claims.contains_key("email"));

        assert!(service.remove_by_code(&expired.code).await.unwrap());
    }
}
