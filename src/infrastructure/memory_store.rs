// In-memory condition store, optionally seeded from a JSON fixture
use crate::application::condition_store::{ConditionStore, StoreError, StoreSnapshot};
use crate::domain::condition::ConditionReading;
use crate::domain::isu::Isu;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub isus: Vec<Isu>,
    #[serde(default)]
    pub conditions: Vec<ConditionReading>,
}

#[derive(Debug, Default)]
struct Tables {
    isus: Vec<Isu>,
    conditions: HashMap<String, BTreeMap<DateTime<Utc>, ConditionReading>>,
}

impl Tables {
    fn insert(&mut self, reading: ConditionReading) -> bool {
        let rows = self.conditions.entry(reading.jia_isu_uuid.clone()).or_default();
        if rows.contains_key(&reading.timestamp) {
            return false;
        }
        rows.insert(reading.timestamp, reading);
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut tables = Tables {
            isus: fixture.isus,
            ..Tables::default()
        };
        for reading in fixture.conditions {
            tables.insert(reading);
        }

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    pub fn load_fixture(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;

        tracing::info!(
            "Loaded fixture {}: {} isus, {} conditions",
            path.display(),
            fixture.isus.len(),
            fixture.conditions.len()
        );
        Ok(Self::from_fixture(fixture))
    }
}

/// Holds the read lock for its whole lifetime, so writers wait until it ends.
struct MemorySnapshot {
    tables: OwnedRwLockReadGuard<Tables>,
}

#[async_trait]
impl StoreSnapshot for MemorySnapshot {
    async fn list_isus(&mut self, jia_user_id: &str) -> Result<Vec<Isu>, StoreError> {
        let mut isus: Vec<Isu> = self
            .tables
            .isus
            .iter()
            .filter(|isu| isu.jia_user_id == jia_user_id)
            .cloned()
            .collect();
        isus.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(isus)
    }

    async fn all_isus(&mut self) -> Result<Vec<Isu>, StoreError> {
        let mut isus = self.tables.isus.clone();
        isus.sort_by_key(|isu| isu.id);
        Ok(isus)
    }

    async fn find_isu(
        &mut self,
        jia_user_id: &str,
        jia_isu_uuid: &str,
    ) -> Result<Option<Isu>, StoreError> {
        Ok(self
            .tables
            .isus
            .iter()
            .find(|isu| isu.jia_user_id == jia_user_id && isu.jia_isu_uuid == jia_isu_uuid)
            .cloned())
    }

    async fn latest_reading(
        &mut self,
        jia_isu_uuid: &str,
    ) -> Result<Option<ConditionReading>, StoreError> {
        Ok(self
            .tables
            .conditions
            .get(jia_isu_uuid)
            .and_then(|rows| rows.last_key_value())
            .map(|(_, reading)| reading.clone()))
    }

    async fn readings(
        &mut self,
        jia_isu_uuid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConditionReading>, StoreError> {
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(self
            .tables
            .conditions
            .get(jia_isu_uuid)
            .map(|rows| rows.range(from..to).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn finish(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ConditionStore for MemoryStore {
    async fn snapshot(&self) -> Result<Box<dyn StoreSnapshot>, StoreError> {
        let tables = self.tables.clone().read_owned().await;
        Ok(Box::new(MemorySnapshot { tables }))
    }

    async fn isu_exists(&self, jia_isu_uuid: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.isus.iter().any(|isu| isu.jia_isu_uuid == jia_isu_uuid))
    }

    async fn append_readings(&self, readings: &[ConditionReading]) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let written = readings
            .iter()
            .filter(|reading| tables.insert((*reading).clone()))
            .count();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn isu(id: i64, uuid: &str, owner: &str) -> Isu {
        Isu {
            id,
            jia_isu_uuid: uuid.to_string(),
            name: format!("isu-{}", id),
            character: "のんき".to_string(),
            jia_user_id: owner.to_string(),
        }
    }

    fn reading(uuid: &str, hour: u32, message: &str) -> ConditionReading {
        ConditionReading {
            jia_isu_uuid: uuid.to_string(),
            timestamp: Utc.with_ymd_and_hms(2021, 8, 1, hour, 0, 0).unwrap(),
            is_sitting: false,
            condition: "is_dirty=false,is_overweight=false,is_broken=false".to_string(),
            message: message.to_string(),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::from_fixture(Fixture {
            isus: vec![isu(1, "a", "alice"), isu(2, "b", "bob"), isu(3, "c", "alice")],
            conditions: vec![reading("a", 2, "second"), reading("a", 1, "first")],
        })
    }

    #[tokio::test]
    async fn test_list_isus_is_owner_scoped_newest_first() {
        let store = store();
        let mut snapshot = store.snapshot().await.unwrap();
        let isus = snapshot.list_isus("alice").await.unwrap();
        snapshot.finish().await.unwrap();

        let ids: Vec<i64> = isus.iter().map(|isu| isu.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_latest_and_ranged_readings() {
        let store = store();
        let mut snapshot = store.snapshot().await.unwrap();

        let latest = snapshot.latest_reading("a").await.unwrap().unwrap();
        assert_eq!(latest.message, "second");
        assert!(snapshot.latest_reading("c").await.unwrap().is_none());

        let from = Utc.with_ymd_and_hms(2021, 8, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2021, 8, 1, 2, 0, 0).unwrap();
        let rows = snapshot.readings("a", from, to).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "first");
    }

    #[tokio::test]
    async fn test_append_skips_existing_timestamp() {
        let store = store();
        let written = store
            .append_readings(&[reading("a", 1, "overwrite"), reading("a", 3, "third")])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let mut snapshot = store.snapshot().await.unwrap();
        let from = Utc.with_ymd_and_hms(2021, 8, 1, 1, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2021, 8, 1, 2, 0, 0).unwrap();
        let rows = snapshot.readings("a", from, to).await.unwrap();
        assert_eq!(rows[0].message, "first");
    }

    #[tokio::test]
    async fn test_fixture_json() {
        let raw = r#"{
            "isus": [{"id": 1, "jia_isu_uuid": "a", "name": "A", "character": "x", "jia_user_id": "u"}],
            "conditions": [{"jia_isu_uuid": "a", "timestamp": "2021-08-01T00:00:00Z",
                            "is_sitting": true, "condition": "is_dirty=true", "message": "m"}]
        }"#;
        let fixture: Fixture = serde_json::from_str(raw).unwrap();
        let store = MemoryStore::from_fixture(fixture);

        assert!(store.isu_exists("a").await.unwrap());
        assert!(!store.isu_exists("z").await.unwrap());
    }
}
