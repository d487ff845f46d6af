use crate::errors::{Error, Result};
use crate::model::{LocationRecord, NewEntry, TelemetryEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Document collection holding device reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Appends a new document under a freshly generated id.
    async fn insert(&self, entry: NewEntry) -> Result<TelemetryEntry>;

    /// Location of the oldest entry for `ip` that carries a latitude.
    async fn first_geocoded_for_ip(&self, ip: &str) -> Result<Option<LocationRecord>>;

    /// Entries with `start <= timestamp <= end`, oldest first.
    async fn entries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryEntry>>;

    /// Overwrites the geolocation fields of one document.
    async fn update_location(&self, id: Uuid, location: &LocationRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<TelemetryEntry>>;
}

/// Process-local store used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: RwLock<Vec<TelemetryEntry>>,
}

impl MemoryEntryStore {
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
impl EntryStore for MemoryEntryStore {
    async fn insert(&self, entry: NewEntry) -> Result<TelemetryEntry> {
        let stored = TelemetryEntry::from_new(Uuid::new_v4(), entry);
        self.entries.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn first_geocoded_for_ip(&self, ip: &str) -> Result<Option<LocationRecord>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.ip_address == ip && e.latitude.is_some())
            .min_by_key(|e| e.timestamp)
            .map(TelemetryEntry::location))
    }

    async fn entries_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TelemetryEntry>> {
        let entries = self.entries.read().await;
        let mut found: Vec<TelemetryEntry> = entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.timestamp);
        Ok(found)
    }

    async fn update_location(&self, id: Uuid, location: &LocationRecord) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(Error::EntryNotFound(id))?;
        entry.apply_location(location);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TelemetryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(ip: &str, timestamp: DateTime<Utc>, location: LocationRecord) -> NewEntry {
        NewEntry {
            xrp_id: "xrp".to_string(),
            platform: None,
            ble: None,
            timestamp,
            ip_address: ip.to_string(),
            user_agent: None,
            location,
        }
    }

    fn philly() -> LocationRecord {
        LocationRecord {
            latitude: Some(40.0),
            longitude: Some(-75.0),
            city: "Philadelphia".to_string(),
            state: "PA".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = MemoryEntryStore::new();
        let now = Utc::now();
        let a = store.insert(entry("1.2.3.4", now, philly())).await.unwrap();
        let b = store.insert(entry("1.2.3.4", now, philly())).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_first_geocoded_skips_unresolved_entries() {
        let store = MemoryEntryStore::new();
        let now = Utc::now();
        store
            .insert(entry("1.2.3.4", now - Duration::hours(2), LocationRecord::unknown()))
            .await
            .unwrap();
        store.insert(entry("1.2.3.4", now, philly())).await.unwrap();
        store
            .insert(entry("5.6.7.8", now - Duration::hours(3), philly()))
            .await
            .unwrap();

        let found = store.first_geocoded_for_ip("1.2.3.4").await.unwrap();
        assert_eq!(found, Some(philly()));
        assert_eq!(store.first_geocoded_for_ip("9.9.9.9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_between_is_inclusive_and_ordered() {
        let store = MemoryEntryStore::new();
        let start = Utc::now() - Duration::days(1);
        let end = Utc::now();

        store.insert(entry("a", end, philly())).await.unwrap();
        store.insert(entry("b", start, philly())).await.unwrap();
        store
            .insert(entry("c", start - Duration::seconds(1), philly()))
            .await
            .unwrap();

        let found = store.entries_between(start, end).await.unwrap();
        let ips: Vec<&str> = found.iter().map(|e| e.ip_address.as_str()).collect();
        assert_eq!(ips, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_update_location() {
        let store = MemoryEntryStore::new();
        let stored = store
            .insert(entry("1.2.3.4", Utc::now(), LocationRecord::unknown()))
            .await
            .unwrap();

        store.update_location(stored.id, &philly()).await.unwrap();

        let reread = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(reread.location(), philly());
    }

    #[test]
    fn test_update_location_unknown_id() {
        tokio_test::block_on(async {
            let store = MemoryEntryStore::new();
            let result = store.update_location(Uuid::new_v4(), &philly()).await;
            assert!(matches!(result, Err(Error::EntryNotFound(_))));
        });
    }

    #[test]
    fn test_get_unknown_id() {
        tokio_test::block_on(async {
            let store = MemoryEntryStore::new();
            store
                .insert(entry("1.2.3.4", Utc::now(), philly()))
                .await
                .unwrap();

            assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
        });
    }
}
