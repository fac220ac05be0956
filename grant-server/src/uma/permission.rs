use super::scope::UmaScopeService;
use super::UmaError;
use crate::store::{dn, Entry, EntryManager, Filter, StoreError, SweepReport};
use crate::token::codec;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TICKET: &str = "ticket";
const CONFIGURATION_CODE: &str = "configurationCode";
const EXPIRATION_DATE: &str = "expirationDate";
const BRANCH_OU: &str = "uma_permission";

/// Ticket attribute carrying the code of the PCT bound to the ticket
pub const PCT: &str = "pct";
/// Ticket attribute carrying the space separated claims gathering script names
pub const GATHERING_ID: &str = "gathering_id";

/// Resource and scopes a client asks access for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub resource_id: String,
    /// Scope ids
    pub scopes: Vec<String>,
}

/// A registered permission, addressed by its ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmaPermission {
    pub dn: String,
    pub ticket: String,
    pub resource_id: String,
    /// DNs of the requested scopes
    #[serde(default)]
    pub scope_dns: Vec<String>,
    /// Shared by all permissions registered by the same request
    pub configuration_code: String,
    pub expiration_date: DateTime<Utc>,
    /// State carried between claims gathering round trips
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Entry for UmaPermission {
    const OBJECT_CLASS: &'static str = "umaPermission";

    fn dn(&self) -> &str {
        &self.dn
    }
}

impl UmaPermission {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Registers, resolves and replaces permission tickets.
///
/// Permissions live under `ou=uma_permission` below the client that registered them.
#[derive(Debug, Clone)]
pub struct UmaPermissionService {
    entry_manager: EntryManager,
    scope_service: UmaScopeService,
    clients_base_dn: String,
    ticket_lifetime: i64,
}

impl UmaPermissionService {
    pub fn new(
        entry_manager: EntryManager,
        scope_service: UmaScopeService,
        clients_base_dn: impl Into<String>,
        ticket_lifetime: i64,
    ) -> Self {
        Self {
            entry_manager,
            scope_service,
            clients_base_dn: clients_base_dn.into(),
            ticket_lifetime,
        }
    }

    pub fn branch_dn(client_dn: &str) -> String {
        format!("ou={},{}", BRANCH_OU, client_dn)
    }

    pub fn build_dn(client_dn: &str, ticket: &str) -> String {
        format!("ticket={},{}", dn::escape(ticket), Self::branch_dn(client_dn))
    }

    pub fn generate_new_ticket() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn generate_configuration_code() -> String {
        format!(
            "{}.{}",
            codec::generate_suffix(8),
            Utc::now().timestamp_millis()
        )
    }

    /// Expiration date of a ticket registered now
    pub fn ticket_expiration_date(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.ticket_lifetime)
    }

    /// Registers one permission per request under `client_dn`.
    ///
    /// Every permission gets its own ticket and all share one configuration code.
    /// Returns the ticket of the first permission, `None` for an empty request list.
    pub async fn add_permission(
        &self,
        requests: &[PermissionRequest],
        expiration_date: DateTime<Utc>,
        client_dn: &str,
    ) -> Result<Option<String>, UmaError> {
        let configuration_code = Self::generate_configuration_code();
        let mut first_ticket = None;
        for request in requests {
            let scope_dns = self
                .scope_service
                .get_scope_dns_by_ids_and_add_if_needed(&request.scopes)
                .await?;
            let ticket = Self::generate_new_ticket();
            let permission = UmaPermission {
                dn: Self::build_dn(client_dn, &ticket),
                ticket: ticket.clone(),
                resource_id: request.resource_id.clone(),
                scope_dns,
                configuration_code: configuration_code.clone(),
                expiration_date,
                attributes: BTreeMap::new(),
                status: None,
            };
            self.persist(&permission, client_dn).await?;
            first_ticket.get_or_insert(ticket);
        }
        Ok(first_ticket)
    }

    async fn persist(&self, permission: &UmaPermission, client_dn: &str) -> Result<(), StoreError> {
        self.entry_manager
            .ensure_branch(BRANCH_OU, &Self::branch_dn(client_dn))
            .await?;
        self.entry_manager.persist(permission).await
    }

    pub async fn merge(&self, permission: &UmaPermission) -> Result<(), StoreError> {
        self.entry_manager.merge(permission).await
    }

    pub async fn merge_silently(&self, permission: &UmaPermission) {
        if let Err(e) = self.merge(permission).await {
            log::error!("Failed to merge permission {}: {}", permission.dn, e);
        }
    }

    /// Live permissions registered under `ticket`; an expired ticket resolves to nothing
    pub async fn get_permissions_by_ticket(
        &self,
        ticket: &str,
    ) -> Result<Vec<UmaPermission>, StoreError> {
        let now = Utc::now();
        let mut permissions = self.find_by_ticket(ticket).await?;
        permissions.retain(|permission| !permission.is_expired(now));
        Ok(permissions)
    }

    async fn find_by_ticket(&self, ticket: &str) -> Result<Vec<UmaPermission>, StoreError> {
        if ticket.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.entry_manager
            .find_entries(&self.clients_base_dn, &Filter::equals(TICKET, ticket))
            .await
    }

    pub async fn get_permission_by_configuration_code(
        &self,
        configuration_code: &str,
        client_dn: &str,
    ) -> Result<Option<UmaPermission>, StoreError> {
        let mut permissions: Vec<UmaPermission> = self
            .entry_manager
            .find_entries(
                client_dn,
                &Filter::equals(CONFIGURATION_CODE, configuration_code),
            )
            .await?;
        Ok(if permissions.is_empty() {
            None
        } else {
            Some(permissions.swap_remove(0))
        })
    }

    pub async fn get_permission_ticket_by_configuration_code(
        &self,
        configuration_code: &str,
        client_dn: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_permission_by_configuration_code(configuration_code, client_dn)
            .await?
            .map(|permission| permission.ticket))
    }

    /// Removes every permission registered under `ticket`
    pub async fn delete_permission(&self, ticket: &str) -> Result<usize, StoreError> {
        let permissions = self.find_by_ticket(ticket).await?;
        for permission in &permissions {
            self.entry_manager.remove(permission).await?;
        }
        Ok(permissions.len())
    }

    /// Moves `permissions` to a fresh ticket carrying `attributes`.
    ///
    /// Each row is removed and written again under the same parent with the new
    /// ticket. Resource and scopes are kept. The old ticket no longer resolves.
    pub async fn change_ticket(
        &self,
        permissions: &[UmaPermission],
        attributes: BTreeMap<String, String>,
    ) -> Result<String, StoreError> {
        let new_ticket = Self::generate_new_ticket();
        for permission in permissions {
            self.entry_manager.remove(permission).await?;

            let parent = dn::parent(&permission.dn)
                .ok_or_else(|| StoreError::InvalidDn(permission.dn.clone()))?;
            let mut moved = permission.clone();
            moved.dn = format!("ticket={},{}", dn::escape(&new_ticket), parent);
            moved.ticket = new_ticket.clone();
            moved.attributes = attributes.clone();
            self.entry_manager.persist(&moved).await?;
        }
        log::debug!(
            "Moved {} permissions to ticket {}",
            permissions.len(),
            new_ticket
        );
        Ok(new_ticket)
    }

    /// Removes every permission that expired at or before `now`
    pub async fn clean_up(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.entry_manager
            .remove_matching::<UmaPermission>(
                &self.clients_base_dn,
                &Filter::less_or_equal(EXPIRATION_DATE, now),
                batch_size,
            )
            .await
    }
}
