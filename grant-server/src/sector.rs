use crate::store::{dn, Entry, EntryManager, StoreError};
use serde::{Deserialize, Serialize};

/// Redirect URIs grouped under one pairwise sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorIdentifier {
    pub dn: String,
    pub id: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

impl Entry for SectorIdentifier {
    const OBJECT_CLASS: &'static str = "authzSectorIdentifier";

    fn dn(&self) -> &str {
        &self.dn
    }
}

#[derive(Debug, Clone)]
pub struct SectorIdentifierService {
    entry_manager: EntryManager,
    base_dn: String,
}

impl SectorIdentifierService {
    pub fn new(entry_manager: EntryManager, base_dn: impl Into<String>) -> Self {
        Self {
            entry_manager,
            base_dn: base_dn.into(),
        }
    }

    pub fn build_dn(&self, id: &str) -> String {
        format!("id={},{}", dn::escape(id), self.base_dn)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SectorIdentifier>, StoreError> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        self.entry_manager.find(&self.build_dn(id)).await
    }

    pub async fn persist(&self, sector: &SectorIdentifier) -> Result<(), StoreError> {
        self.entry_manager.persist(sector).await
    }
}
