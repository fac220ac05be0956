use crate::store::{Entry, EntryManager, Filter, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// End user (resource owner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub dn: String,
    #[serde(rename = "uid")]
    pub user_id: String,
    /// Claims released in ID tokens
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Entry for User {
    const OBJECT_CLASS: &'static str = "authzPerson";

    fn dn(&self) -> &str {
        &self.dn
    }
}

/// Directory access to people
#[derive(Debug, Clone)]
pub struct UserService {
    entry_manager: EntryManager,
    base_dn: String,
}

impl UserService {
    pub fn new(entry_manager: EntryManager, base_dn: impl Into<String>) -> Self {
        Self {
            entry_manager,
            base_dn: base_dn.into(),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        if user_id.trim().is_empty() {
            return Ok(None);
        }
        let mut users: Vec<User> = self
            .entry_manager
            .find_entries(&self.base_dn, &Filter::equals("uid", user_id))
            .await?;
        if users.len() > 1 {
            log::warn!("{} people share uid {}", users.len(), user_id);
        }
        Ok(if users.is_empty() {
            None
        } else {
            Some(users.swap_remove(0))
        })
    }

    pub async fn get_user_by_dn(&self, dn: &str) -> Result<Option<User>, StoreError> {
        self.entry_manager.find(dn).await
    }

    pub async fn persist(&self, user: &User) -> Result<(), StoreError> {
        self.entry_manager.persist(user).await
    }
}
