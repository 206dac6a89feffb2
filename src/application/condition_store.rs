// Store traits for device and condition data access
use crate::domain::condition::ConditionReading;
use crate::domain::isu::Isu;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
}

/// A read-consistent view of the store.
///
/// Every read made through one snapshot observes the same point in time.
/// Call `finish` once the reads are done; dropping without finishing
/// discards the snapshot.
#[async_trait]
pub trait StoreSnapshot: Send {
    /// Devices owned by `jia_user_id`, most recently registered first
    async fn list_isus(&mut self, jia_user_id: &str) -> Result<Vec<Isu>, StoreError>;

    /// Every registered device regardless of owner, oldest first
    async fn all_isus(&mut self) -> Result<Vec<Isu>, StoreError>;

    async fn find_isu(
        &mut self,
        jia_user_id: &str,
        jia_isu_uuid: &str,
    ) -> Result<Option<Isu>, StoreError>;

    /// The newest reading of a device, if it has ever reported
    async fn latest_reading(
        &mut self,
        jia_isu_uuid: &str,
    ) -> Result<Option<ConditionReading>, StoreError>;

    /// Readings with `from <= timestamp < to`, ascending by timestamp
    async fn readings(
        &mut self,
        jia_isu_uuid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ConditionReading>, StoreError>;

    async fn finish(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ConditionStore: Send + Sync {
    async fn snapshot(&self) -> Result<Box<dyn StoreSnapshot>, StoreError>;

    async fn isu_exists(&self, jia_isu_uuid: &str) -> Result<bool, StoreError>;

    /// Append readings; a reading whose (device, timestamp) pair already
    /// exists is skipped. Returns the number of rows written.
    async fn append_readings(&self, readings: &[ConditionReading]) -> Result<usize, StoreError>;
}
