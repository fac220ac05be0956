use super::{dn, DirectoryBackend, Filter, RawEntry, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-process directory keyed by normalized DN.
///
/// Iteration follows the normalized DN order, which keeps paged searches stable.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<BTreeMap<String, RawEntry>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DirectoryBackend for MemoryDirectory {
    async fn get(&self, dn: &str) -> Result<Option<RawEntry>, StoreError> {
        Ok(self.entries.read().await.get(&dn::normalize(dn)).cloned())
    }

    async fn search(
        &self,
        base_dn: &str,
        object_class: &str,
        filter: &Filter,
        start: usize,
        limit: Option<usize>,
    ) -> Result<Vec<RawEntry>, StoreError> {
        let entries = self.entries.read().await;
        let matching = entries
            .values()
            .filter(|entry| entry.object_class == object_class)
            .filter(|entry| dn::is_within(&entry.dn, base_dn))
            .filter(|entry| filter.matches(&entry.attributes))
            .skip(start)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn add(&self, entry: RawEntry) -> Result<(), StoreError> {
        dn::parse(&entry.dn)?;
        let key = dn::normalize(&entry.dn);
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists(entry.dn));
        }
        log::trace!("Adding entry {}", entry.dn);
        entries.insert(key, entry);
        Ok(())
    }

    async fn modify(&self, entry: RawEntry) -> Result<(), StoreError> {
        let key = dn::normalize(&entry.dn);
        let mut entries = self.entries.write().await;
        match entries.get_mut(&key) {
            Some(existing) => {
                *existing = entry;
                Ok(())
            }
            None => Err(StoreError::NoSuchEntry(entry.dn)),
        }
    }

    async fn delete(&self, dn: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match entries.remove(&dn::normalize(dn)) {
            Some(_) => {
                log::trace!("Removed entry {}", dn);
                Ok(())
            }
            None => Err(StoreError::NoSuchEntry(dn.to_string())),
        }
    }

    async fn delete_subtree(&self, dn: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !dn::is_within(&entry.dn, dn));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(dn: &str, object_class: &str, attributes: serde_json::Value) -> RawEntry {
        RawEntry {
            dn: dn.to_string(),
            object_class: object_class.to_string(),
            attributes,
        }
    }

    #[tokio::test]
    async fn test_subtree_search_with_paging() {
        let dir = MemoryDirectory::new();
        for i in 0..5 {
            dir.add(raw(
                &format!("id={},ou=a,o=test", i),
                "item",
                json!({"n": i.to_string()}),
            ))
            .await
            .unwrap();
        }
        dir.add(raw("id=x,ou=b,o=test", "item", json!({"n": "x"})))
            .await
            .unwrap();

        let all = dir
            .search("o=test", "item", &Filter::any(), 0, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 6);

        let page = dir
            .search("ou=a,o=test", "item", &Filter::any(), 1, Some(2))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(ids, vec!["id=1,ou=a,o=test", "id=2,ou=a,o=test"]);

        let none = dir
            .search("o=test", "other", &Filter::any(), 0, None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_dn_lookup_is_case_insensitive() {
        let dir = MemoryDirectory::new();
        dir.add(raw("inum=ABC,ou=clients,o=test", "client", json!({})))
            .await
            .unwrap();
        assert!(dir.get("INUM=abc, ou=clients,o=test").await.unwrap().is_some());
        assert!(matches!(
            dir.add(raw("inum=abc,ou=clients,o=test", "client", json!({})))
                .await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_subtree() {
        let dir = MemoryDirectory::new();
        for dn in [
            "inum=c1,ou=clients,o=test",
            "ou=uma_rpt,inum=c1,ou=clients,o=test",
            "uniqueIdentifier=r1,ou=uma_rpt,inum=c1,ou=clients,o=test",
            "inum=c2,ou=clients,o=test",
        ] {
            dir.add(raw(dn, "item", json!({}))).await.unwrap();
        }
        assert_eq!(dir.delete_subtree("inum=c1,ou=clients,o=test").await.unwrap(), 3);
        assert_eq!(dir.len().await, 1);
        assert_eq!(dir.delete_subtree("inum=c1,ou=clients,o=test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_malformed_dn_and_unknown_delete() {
        let dir = MemoryDirectory::new();
        assert!(matches!(
            dir.add(raw("no-equals-sign", "item", json!({}))).await,
            Err(StoreError::InvalidDn(_))
        ));
        assert!(matches!(
            dir.delete("id=1,o=test").await,
            Err(StoreError::NoSuchEntry(_))
        ));
        assert!(dir.is_empty().await);
    }
}
