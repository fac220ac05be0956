use super::permission::UmaPermission;
use super::UmaError;
use crate::client::ClientService;
use crate::store::{dn, Entry, EntryManager, Filter, StoreError, SweepReport};
use crate::token::codec;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const TOKEN_CODE: &str = "tokenCode";
const EXPIRATION_DATE: &str = "expirationDate";
const BRANCH_OU: &str = "uma_rpt";
const DEFAULT_RPT_LIFETIME: i64 = 3600;

/// Requesting party token.
///
/// Permissions are referenced by DN and resolved on demand; the RPT does not own them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmaRpt {
    pub dn: String,
    #[serde(rename = "uniqueIdentifier")]
    pub id: String,
    #[serde(rename = "tokenCode")]
    pub code: String,
    pub creation_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub client_id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Entry for UmaRpt {
    const OBJECT_CLASS: &'static str = "umaRpt";

    fn dn(&self) -> &str {
        &self.dn
    }
}

impl UmaRpt {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }
}

#[derive(Debug, Clone)]
pub struct UmaRptService {
    entry_manager: EntryManager,
    client_service: ClientService,
    clients_base_dn: String,
    lifetime: i64,
}

impl UmaRptService {
    pub fn new(
        entry_manager: EntryManager,
        client_service: ClientService,
        clients_base_dn: impl Into<String>,
        lifetime: i64,
    ) -> Self {
        Self {
            entry_manager,
            client_service,
            clients_base_dn: clients_base_dn.into(),
            lifetime,
        }
    }

    pub fn branch_dn(client_dn: &str) -> String {
        format!("ou={},{}", BRANCH_OU, client_dn)
    }

    pub fn build_dn(client_dn: &str, id: &str) -> String {
        format!(
            "uniqueIdentifier={},{}",
            dn::escape(id),
            Self::branch_dn(client_dn)
        )
    }

    /// Expiration date of an RPT issued now; lifetimes <= 0 fall back to 3600 seconds
    pub fn rpt_expiration_date(&self) -> DateTime<Utc> {
        let lifetime = if self.lifetime <= 0 {
            DEFAULT_RPT_LIFETIME
        } else {
            self.lifetime
        };
        Utc::now() + Duration::seconds(lifetime)
    }

    /// New RPT for `client_id`, not yet persisted
    pub fn create_rpt(&self, client_id: &str) -> UmaRpt {
        UmaRpt {
            dn: String::new(),
            id: String::new(),
            code: codec::generate_uma_code(),
            creation_date: Utc::now(),
            expiration_date: self.rpt_expiration_date(),
            client_id: client_id.to_string(),
            permissions: Vec::new(),
        }
    }

    /// Stores `rpt` below its client, assigning its id and DN
    pub async fn persist(&self, rpt: &mut UmaRpt) -> Result<(), UmaError> {
        let client = self
            .client_service
            .get_client(&rpt.client_id)
            .await?
            .ok_or_else(|| UmaError::ClientNotFound(rpt.client_id.clone()))?;
        self.entry_manager
            .ensure_branch(BRANCH_OU, &Self::branch_dn(&client.dn))
            .await?;
        rpt.id = uuid::Uuid::new_v4().to_string();
        rpt.dn = Self::build_dn(&client.dn, &rpt.id);
        self.entry_manager.persist(rpt).await?;
        Ok(())
    }

    pub async fn create_rpt_and_persist(&self, client_id: &str) -> Result<UmaRpt, UmaError> {
        let mut rpt = self.create_rpt(client_id);
        self.persist(&mut rpt).await?;
        log::debug!("Created RPT for client {}", client_id);
        Ok(rpt)
    }

    /// Live RPT with `code`; an expired RPT is reported as missing
    pub async fn get_rpt_by_code(&self, code: &str) -> Result<Option<UmaRpt>, StoreError> {
        Ok(self
            .find_by_code(code)
            .await?
            .filter(|rpt| !rpt.is_expired(Utc::now())))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<UmaRpt>, StoreError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        let mut entries: Vec<UmaRpt> = self
            .entry_manager
            .find_entries(&self.clients_base_dn, &Filter::equals(TOKEN_CODE, code))
            .await?;
        if entries.is_empty() {
            log::debug!("Failed to find RPT by code: {}", code);
            return Ok(None);
        }
        Ok(Some(entries.swap_remove(0)))
    }

    /// Removes the RPT with `code`, returning whether one existed
    pub async fn delete_by_code(&self, code: &str) -> Result<bool, StoreError> {
        match self.find_by_code(code).await? {
            Some(rpt) => {
                self.entry_manager.remove(&rpt).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appends the DNs of `permissions` to the RPT and stores it. Empty input is a no-op.
    pub async fn add_permission_to_rpt(
        &self,
        rpt: &mut UmaRpt,
        permissions: &[UmaPermission],
    ) -> Result<(), StoreError> {
        if permissions.is_empty() {
            return Ok(());
        }
        rpt.permissions.extend(permissions.iter().map(|p| p.dn.clone()));
        self.entry_manager.merge(rpt).await?;
        log::trace!("Persisted RPT {} with {} permissions", rpt.id, rpt.permissions.len());
        Ok(())
    }

    /// Permissions the RPT references; DNs that no longer resolve are skipped
    pub async fn get_rpt_permissions(
        &self,
        rpt: &UmaRpt,
    ) -> Result<Vec<UmaPermission>, StoreError> {
        let mut result = Vec::with_capacity(rpt.permissions.len());
        for permission_dn in &rpt.permissions {
            if let Some(permission) = self.entry_manager.find(permission_dn).await? {
                result.push(permission);
            }
        }
        Ok(result)
    }

    /// First permission of the RPT bound to `resource_id`
    pub async fn get_permission_from_rpt_by_resource_id(
        &self,
        rpt: &UmaRpt,
        resource_id: &str,
    ) -> Result<Option<UmaPermission>, StoreError> {
        if resource_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .get_rpt_permissions(rpt)
            .await?
            .into_iter()
            .find(|permission| permission.resource_id == resource_id))
    }

    /// Removes every RPT that expired at or before `now`
    pub async fn clean_up(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.entry_manager
            .remove_matching::<UmaRpt>(
                &self.clients_base_dn,
                &Filter::less_or_equal(EXPIRATION_DATE, now),
                batch_size,
            )
            .await
    }
}
