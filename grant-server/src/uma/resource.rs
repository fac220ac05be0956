use super::UmaError;
use crate::cache::{Cache, CacheBackend};
use crate::store::{dn, Entry, EntryManager, Filter, StoreError, SweepReport};
use chrono::{DateTime, Utc};
use log::{error, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const RESOURCE_CACHE_TTL: Duration = Duration::from_secs(120);
const RESOURCE_ID: &str = "id";
const ASSOCIATED_CLIENT: &str = "clients";
const EXPIRATION_DATE: &str = "expirationDate";

/// Resource registered by a resource server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmaResource {
    pub dn: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// DNs of the scopes available on the resource
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_expression: Option<String>,
    /// DNs of the clients associated with the resource
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

impl Entry for UmaResource {
    const OBJECT_CLASS: &'static str = "umaResource";

    fn dn(&self) -> &str {
        &self.dn
    }
}

impl UmaResource {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expiration| expiration <= now)
    }
}

/// Resource registry backed by the directory, with resources cached by DN for 120 seconds
#[derive(Debug, Clone)]
pub struct UmaResourceService {
    entry_manager: EntryManager,
    cache: Arc<Cache>,
    base_dn: String,
}

impl UmaResourceService {
    pub fn new(entry_manager: EntryManager, cache: Arc<Cache>, uma_base_dn: &str) -> Self {
        Self {
            entry_manager,
            cache,
            base_dn: format!("ou=resources,{}", uma_base_dn),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn build_dn(&self, id: &str) -> String {
        format!("id={},{}", dn::escape(id), self.base_dn)
    }

    pub fn validate(resource: &UmaResource) -> Result<(), UmaError> {
        if resource.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(UmaError::InvalidResource(
                "Name is required for resource".to_string(),
            ));
        }
        let has_expression = resource
            .scope_expression
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());
        if resource.scopes.is_empty() && !has_expression {
            return Err(UmaError::InvalidResource(
                "Scope must be specified for resource".to_string(),
            ));
        }
        if resource.is_expired(Utc::now()) {
            return Err(UmaError::InvalidResource(
                "Resource must not be expired".to_string(),
            ));
        }
        Ok(())
    }

    async fn prepare_branch(&self) -> Result<(), StoreError> {
        self.entry_manager
            .ensure_branch("resources", &self.base_dn)
            .await
    }

    pub async fn add_resource(&self, resource: &UmaResource) -> Result<(), UmaError> {
        Self::validate(resource)?;
        self.prepare_branch().await?;
        self.entry_manager.persist(resource).await?;
        self.put_in_cache(resource).await;
        Ok(())
    }

    pub async fn update_resource(&self, resource: &UmaResource) -> Result<(), UmaError> {
        Self::validate(resource)?;
        self.entry_manager.merge(resource).await?;
        self.put_in_cache(resource).await;
        Ok(())
    }

    pub async fn remove(&self, resource: &UmaResource) -> Result<(), StoreError> {
        self.entry_manager.remove(resource).await?;
        self.remove_from_cache(resource).await;
        Ok(())
    }

    /// Removes the resource with `id`, returning whether one existed
    pub async fn remove_by_id(&self, id: &str) -> Result<bool, StoreError> {
        match self.get_resource_by_id(id).await? {
            Some(resource) => {
                self.remove(&resource).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn get_resource_by_id(&self, id: &str) -> Result<Option<UmaResource>, StoreError> {
        if let Some(resource) = self.from_cache(&self.build_dn(id)).await {
            trace!("UMA resource from cache, id: {}", id);
            return Ok(Some(resource));
        }
        let mut found: Vec<UmaResource> = self
            .entry_manager
            .find_entries(&self.base_dn, &Filter::equals(RESOURCE_ID, id))
            .await?;
        if found.len() > 1 {
            error!("Multiple resources found with id: {}", id);
        }
        Ok(if found.is_empty() {
            None
        } else {
            let resource = found.swap_remove(0);
            self.put_in_cache(&resource).await;
            Some(resource)
        })
    }

    pub async fn get_resource_by_dn(
        &self,
        resource_dn: &str,
    ) -> Result<Option<UmaResource>, StoreError> {
        if let Some(resource) = self.from_cache(resource_dn).await {
            return Ok(Some(resource));
        }
        self.entry_manager.find(resource_dn).await
    }

    /// Resources with the given ids; unknown ids are logged and skipped
    pub async fn get_resources(
        &self,
        ids: &HashSet<String>,
    ) -> Result<Vec<UmaResource>, StoreError> {
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_resource_by_id(id).await? {
                Some(resource) => result.push(resource),
                None => error!("Failed to find resource by id: {}", id),
            }
        }
        Ok(result)
    }

    pub async fn get_resources_by_associated_client(
        &self,
        client_dn: &str,
    ) -> Result<Vec<UmaResource>, StoreError> {
        if client_dn.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.entry_manager
            .find_entries(&self.base_dn, &Filter::equals(ASSOCIATED_CLIENT, client_dn))
            .await
    }

    async fn put_in_cache(&self, resource: &UmaResource) {
        if let Err(e) = self
            .cache
            .set_with_ttl(&resource.dn, resource, RESOURCE_CACHE_TTL)
            .await
        {
            error!("Failed to put resource {} in cache: {}", resource.dn, e);
        }
    }

    async fn from_cache(&self, resource_dn: &str) -> Option<UmaResource> {
        match self.cache.get(resource_dn).await {
            Ok(resource) => resource,
            Err(e) => {
                error!("Failed to fetch resource {} from cache: {}", resource_dn, e);
                None
            }
        }
    }

    /// Evicts the resource from the cache, returning false if the cache failed
    pub async fn remove_from_cache(&self, resource: &UmaResource) -> bool {
        match self.cache.delete(&resource.dn).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to evict resource {}: {}", resource.dn, e);
                false
            }
        }
    }

    /// Removes every resource that expired at or before `now`
    pub async fn clean_up(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.prepare_branch().await?;
        self.entry_manager
            .sweep(
                &self.base_dn,
                &Filter::less_or_equal(EXPIRATION_DATE, now),
                batch_size,
                move |resource: UmaResource| async move { self.remove(&resource).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCache;
    use crate::store::MemoryDirectory;

    fn service() -> UmaResourceService {
        UmaResourceService::new(
            EntryManager::new(Arc::new(MemoryDirectory::new())),
            Arc::new(Cache::InMemory(InMemoryCache::new(60, 16).unwrap())),
            "ou=uma,o=test",
        )
    }

    fn resource(service: &UmaResourceService, id: &str) -> UmaResource {
        UmaResource {
            dn: service.build_dn(id),
            id: id.to_string(),
            name: Some(format!("{} resource", id)),
            description: None,
            scopes: vec!["id=view,ou=scopes,ou=uma,o=test".to_string()],
            scope_expression: None,
            clients: vec!["inum=rs-1,ou=clients,o=test".to_string()],
            creation_date: Some(Utc::now()),
            expiration_date: None,
        }
    }

    #[tokio::test]
    async fn test_validation() {
        let service = service();
        let mut r = resource(&service, "photos");
        assert!(UmaResourceService::validate(&r).is_ok());

        r.scopes.clear();
        assert!(UmaResourceService::validate(&r).is_err());
        r.scope_expression = Some("view and edit".to_string());
        assert!(UmaResourceService::validate(&r).is_ok());

        r.name = Some(" ".to_string());
        assert!(matches!(
            service.add_resource(&r).await,
            Err(UmaError::InvalidResource(_))
        ));

        let mut expired = resource(&service, "old");
        expired.expiration_date = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(UmaResourceService::validate(&expired).is_err());
    }

    #[tokio::test]
    async fn test_add_lookup_and_remove() {
        let service = service();
        let r = resource(&service, "photos");
        service.add_resource(&r).await.unwrap();

        assert_eq!(service.get_resource_by_id("photos").await.unwrap(), Some(r.clone()));
        assert_eq!(service.get_resource_by_dn(&r.dn).await.unwrap(), Some(r.clone()));
        assert_eq!(
            service
                .get_resources_by_associated_client("inum=rs-1,ou=clients,o=test")
                .await
                .unwrap()
                .len(),
            1
        );

        let ids: HashSet<String> = ["photos".to_string(), "gone".to_string()].into();
        assert_eq!(service.get_resources(&ids).await.unwrap().len(), 1);

        assert!(service.remove_by_id("photos").await.unwrap());
        assert!(service.get_resource_by_id("photos").await.unwrap().is_none());
        assert!(!service.remove_by_id("photos").await.unwrap());
    }

    #[tokio::test]
    async fn test_clean_up_evicts_expired_resources() {
        let service = service();
        let mut short_lived = resource(&service, "short");
        short_lived.expiration_date = Some(Utc::now() + chrono::Duration::milliseconds(200));
        service.add_resource(&short_lived).await.unwrap();
        service.add_resource(&resource(&service, "forever")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let now = Utc::now();
        assert_eq!(service.clean_up(now, 10).await.unwrap().removed, 1);
        assert!(service.get_resource_by_id("short").await.unwrap().is_none());
        assert!(service.get_resource_by_id("forever").await.unwrap().is_some());
        assert_eq!(service.clean_up(now, 10).await.unwrap(), SweepReport::default());
    }
}
