use crate::store::{dn, Entry, EntryManager, Filter, StoreError, SweepReport};
use crate::token::signer::SignatureAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Registered OAuth client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub dn: String,
    #[serde(rename = "inum")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signed_response_alg: Option<SignatureAlgorithm>,
    /// Scopes the client may be granted
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<DateTime<Utc>>,
}

impl Entry for Client {
    const OBJECT_CLASS: &'static str = "authzClient";

    fn dn(&self) -> &str {
        &self.dn
    }
}

pub const CLIENT_SECRET_EXPIRES_AT: &str = "clientSecretExpiresAt";

/// Directory access to clients
#[derive(Debug, Clone)]
pub struct ClientService {
    entry_manager: EntryManager,
    base_dn: String,
}

impl ClientService {
    pub fn new(entry_manager: EntryManager, base_dn: impl Into<String>) -> Self {
        Self {
            entry_manager,
            base_dn: base_dn.into(),
        }
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn build_dn(&self, client_id: &str) -> String {
        format!("inum={},{}", dn::escape(client_id), self.base_dn)
    }

    /// Client by id, `None` for a blank id or an unknown client
    pub async fn get_client(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        if client_id.trim().is_empty() {
            return Ok(None);
        }
        self.entry_manager.find(&self.build_dn(client_id)).await
    }

    pub async fn get_client_by_dn(&self, client_dn: &str) -> Result<Option<Client>, StoreError> {
        self.entry_manager.find(client_dn).await
    }

    pub async fn persist(&self, client: &Client) -> Result<(), StoreError> {
        self.entry_manager.persist(client).await
    }

    pub async fn merge(&self, client: &Client) -> Result<(), StoreError> {
        self.entry_manager.merge(client).await
    }

    /// Removes the client and everything stored below it
    pub async fn remove(&self, client: &Client) -> Result<(), StoreError> {
        let removed = self.entry_manager.remove_recursively(&client.dn).await?;
        log::debug!("Removed client {} ({} entries)", client.client_id, removed);
        Ok(())
    }

    /// Runs `action` over every client whose secret expired at or before `now`
    pub async fn sweep_clients_with_expired_secret<F, Fut, Er>(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
        action: F,
    ) -> Result<SweepReport, StoreError>
    where
        F: FnMut(Client) -> Fut,
        Fut: Future<Output = Result<(), Er>>,
        Er: std::fmt::Display,
    {
        let filter = Filter::less_or_equal(CLIENT_SECRET_EXPIRES_AT, now);
        self.entry_manager
            .sweep(&self.base_dn, &filter, batch_size, action)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDirectory;
    use std::sync::Arc;

    fn service() -> ClientService {
        ClientService::new(
            EntryManager::new(Arc::new(MemoryDirectory::new())),
            "ou=clients,o=test",
        )
    }

    fn client(service: &ClientService, id: &str) -> Client {
        Client {
            dn: service.build_dn(id),
            client_id: id.to_string(),
            client_secret: Some("secret".to_string()),
            id_token_signed_response_alg: Some(SignatureAlgorithm::HS256),
            scopes: vec!["openid".to_string()],
            client_secret_expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_client() {
        let service = service();
        let c = client(&service, "@!1111!0008");
        service.persist(&c).await.unwrap();

        assert_eq!(service.get_client("@!1111!0008").await.unwrap(), Some(c.clone()));
        assert_eq!(service.get_client_by_dn(&c.dn).await.unwrap(), Some(c));
        assert!(service.get_client("other").await.unwrap().is_none());
        assert!(service.get_client(" ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_expired_secrets() {
        let service = service();
        let now = Utc::now();
        let mut expired = client(&service, "expired");
        expired.client_secret_expires_at = Some(now - chrono::Duration::seconds(5));
        let mut live = client(&service, "live");
        live.client_secret_expires_at = Some(now + chrono::Duration::seconds(3600));
        let forever = client(&service, "forever");
        for c in [&expired, &live, &forever] {
            service.persist(c).await.unwrap();
        }

        let report = service
            .sweep_clients_with_expired_secret(now, 10, |c| {
                let service = service.clone();
                async move { service.remove(&c).await }
            })
            .await
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(service.get_client("expired").await.unwrap().is_none());
        assert!(service.get_client("live").await.unwrap().is_some());
        assert!(service.get_client("forever").await.unwrap().is_some());
    }
}
