use super::record::{TokenRecord, EXPIRATION_DATE, GRANT_ID, TOKEN_CODE};
use crate::store::{dn, EntryManager, Filter, StoreError, SweepReport};
use crate::token::codec;
use chrono::{DateTime, Utc};

/// Directory access to token rows
#[derive(Debug, Clone)]
pub struct GrantService {
    entry_manager: EntryManager,
    clients_base_dn: String,
}

impl GrantService {
    pub fn new(entry_manager: EntryManager, clients_base_dn: impl Into<String>) -> Self {
        Self {
            entry_manager,
            clients_base_dn: clients_base_dn.into(),
        }
    }

    pub fn generate_grant_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn client_dn(&self, client_id: &str) -> String {
        format!("inum={},{}", dn::escape(client_id), self.clients_base_dn)
    }

    pub fn build_dn(&self, id: &str, grant_id: &str, client_id: &str) -> String {
        format!(
            "uniqueIdentifier={},grantId={},{}",
            dn::escape(id),
            dn::escape(grant_id),
            self.client_dn(client_id)
        )
    }

    pub async fn persist(&self, record: &TokenRecord) -> Result<(), StoreError> {
        log::trace!(
            "Persisting {} row for grant {}",
            record.token_type,
            record.grant_id
        );
        self.entry_manager.persist(record).await
    }

    pub async fn merge(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.entry_manager.merge(record).await
    }

    /// Merges the row, logging instead of returning a failure
    pub async fn merge_silently(&self, record: &TokenRecord) {
        if let Err(e) = self.entry_manager.merge(record).await {
            log::error!("Failed to merge token row {}: {}", record.dn, e);
        }
    }

    pub async fn remove(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.entry_manager.remove(record).await
    }

    /// All rows of a grant, expired or not
    pub async fn get_grants_by_grant_id(
        &self,
        grant_id: &str,
    ) -> Result<Vec<TokenRecord>, StoreError> {
        self.entry_manager
            .find_entries(&self.clients_base_dn, &Filter::equals(GRANT_ID, grant_id))
            .await
    }

    /// Live row carrying the hash of `code`
    pub async fn get_grant_by_code(&self, code: &str) -> Result<Option<TokenRecord>, StoreError> {
        self.find_live_by_code(&self.clients_base_dn, code).await
    }

    /// Live row carrying the hash of `code`, issued to `client_id`
    pub async fn get_grant_by_code_and_client(
        &self,
        code: &str,
        client_id: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        if client_id.trim().is_empty() {
            return Ok(None);
        }
        self.find_live_by_code(&self.client_dn(client_id), code)
            .await
    }

    async fn find_live_by_code(
        &self,
        base_dn: &str,
        code: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        if code.is_empty() {
            return Ok(None);
        }
        let filter = Filter::equals(TOKEN_CODE, codec::hash_code(code));
        let now = Utc::now();
        let records: Vec<TokenRecord> = self.entry_manager.find_entries(base_dn, &filter).await?;
        // expired rows are reported exactly like missing ones
        Ok(records.into_iter().find(|r| !r.is_expired(now)))
    }

    pub async fn get_grants_of_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<TokenRecord>, StoreError> {
        if client_id.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.entry_manager
            .find_entries(&self.client_dn(client_id), &Filter::any())
            .await
    }

    pub async fn remove_all_by_grant_id(&self, grant_id: &str) -> Result<usize, StoreError> {
        let records = self.get_grants_by_grant_id(grant_id).await?;
        let mut removed = 0;
        for record in &records {
            match self.remove(record).await {
                Ok(()) => removed += 1,
                Err(e) => log::error!("Failed to remove token row {}: {}", record.dn, e),
            }
        }
        log::debug!("Removed {} token rows of grant {}", removed, grant_id);
        Ok(removed)
    }

    /// Removes every row that expired at or before `now`
    pub async fn clean_up(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> Result<SweepReport, StoreError> {
        self.entry_manager
            .remove_matching::<TokenRecord>(
                &self.clients_base_dn,
                &Filter::less_or_equal(EXPIRATION_DATE, now),
                batch_size,
            )
            .await
    }
}
