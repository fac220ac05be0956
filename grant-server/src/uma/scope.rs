use crate::store::{dn, Entry, EntryManager, Filter, StoreError};
use serde::{Deserialize, Serialize};

const SCOPE_ID: &str = "id";

/// UMA scope and the policy scripts guarding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmaScopeDescription {
    pub dn: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_uri: Option<String>,
    /// DNs of the authorization policy scripts bound to the scope
    #[serde(default)]
    pub authorization_policies: Vec<String>,
}

impl Entry for UmaScopeDescription {
    const OBJECT_CLASS: &'static str = "umaScope";

    fn dn(&self) -> &str {
        &self.dn
    }
}

#[derive(Debug, Clone)]
pub struct UmaScopeService {
    entry_manager: EntryManager,
    base_dn: String,
}

impl UmaScopeService {
    pub fn new(entry_manager: EntryManager, uma_base_dn: &str) -> Self {
        Self {
            entry_manager,
            base_dn: format!("ou=scopes,{}", uma_base_dn),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn build_dn(&self, id: &str) -> String {
        format!("id={},{}", dn::escape(id), self.base_dn)
    }

    pub async fn get_scope(&self, id: &str) -> Result<Option<UmaScopeDescription>, StoreError> {
        let mut scopes: Vec<UmaScopeDescription> = self
            .entry_manager
            .find_entries(&self.base_dn, &Filter::equals(SCOPE_ID, id))
            .await?;
        Ok(if scopes.is_empty() {
            None
        } else {
            Some(scopes.swap_remove(0))
        })
    }

    pub async fn get_scope_by_dn(
        &self,
        scope_dn: &str,
    ) -> Result<Option<UmaScopeDescription>, StoreError> {
        self.entry_manager.find(scope_dn).await
    }

    pub async fn persist(&self, scope: &UmaScopeDescription) -> Result<(), StoreError> {
        self.entry_manager
            .ensure_branch("scopes", &self.base_dn)
            .await?;
        self.entry_manager.persist(scope).await
    }

    /// Scopes stored at `dns`; unknown DNs are skipped
    pub async fn get_scopes_by_dns(
        &self,
        dns: &[String],
    ) -> Result<Vec<UmaScopeDescription>, StoreError> {
        let mut result = Vec::with_capacity(dns.len());
        for scope_dn in dns {
            match self.get_scope_by_dn(scope_dn).await? {
                Some(scope) => result.push(scope),
                None => log::warn!("Failed to find scope by dn: {}", scope_dn),
            }
        }
        Ok(result)
    }

    pub async fn get_scope_ids_by_dns(&self, dns: &[String]) -> Result<Vec<String>, StoreError> {
        Ok(self
            .get_scopes_by_dns(dns)
            .await?
            .into_iter()
            .map(|scope| scope.id)
            .collect())
    }

    /// DNs of the scopes named by `ids`, creating a bare scope for every unknown id
    pub async fn get_scope_dns_by_ids_and_add_if_needed(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_scope(id).await? {
                Some(scope) => result.push(scope.dn),
                None => {
                    let scope = UmaScopeDescription {
                        dn: self.build_dn(id),
                        id: id.clone(),
                        display_name: Some(id.clone()),
                        icon_uri: None,
                        authorization_policies: Vec::new(),
                    };
                    self.persist(&scope).await?;
                    log::debug!("Added UMA scope {}", id);
                    result.push(scope.dn);
                }
            }
        }
        Ok(result)
    }
}
