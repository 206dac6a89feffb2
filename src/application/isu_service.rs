// Isu service - Use cases for listing devices with their latest condition
use crate::application::condition_store::{ConditionStore, StoreSnapshot};
use crate::application::error::ServiceError;
use crate::domain::condition::classify;
use crate::domain::isu::{DeviceSummary, Isu, IsuCondition, IsuView};
use std::sync::Arc;

#[derive(Clone)]
pub struct IsuService {
    store: Arc<dyn ConditionStore>,
}

impl IsuService {
    pub fn new(store: Arc<dyn ConditionStore>) -> Self {
        Self { store }
    }

    /// List the owner's devices, each with its latest classified condition.
    /// The device list and every latest reading come from one snapshot.
    pub async fn list_isus(&self, jia_user_id: &str) -> Result<Vec<DeviceSummary>, ServiceError> {
        let mut snapshot = self.store.snapshot().await?;
        let isus = snapshot.list_isus(jia_user_id).await?;
        let summaries = join_latest_conditions(snapshot.as_mut(), isus).await?;
        snapshot.finish().await?;

        tracing::debug!("Listed {} isus for {}", summaries.len(), jia_user_id);
        Ok(summaries)
    }

    pub async fn get_isu(&self, jia_user_id: &str, jia_isu_uuid: &str) -> Result<IsuView, ServiceError> {
        let mut snapshot = self.store.snapshot().await?;
        let isu = snapshot.find_isu(jia_user_id, jia_isu_uuid).await?;
        snapshot.finish().await?;

        isu.map(IsuView::from).ok_or(ServiceError::NotFound("isu"))
    }
}

/// Attach each device's most recent reading, classified.
///
/// A device that never reported gets no latest condition. Any store or
/// classification failure aborts the whole listing. Input order is kept.
pub async fn join_latest_conditions(
    snapshot: &mut dyn StoreSnapshot,
    isus: Vec<Isu>,
) -> Result<Vec<DeviceSummary>, ServiceError> {
    let mut summaries = Vec::with_capacity(isus.len());

    for isu in isus {
        let latest = match snapshot.latest_reading(&isu.jia_isu_uuid).await? {
            Some(reading) => {
                let level = classify(&reading.condition).map_err(|e| {
                    tracing::error!(
                        "Failed to classify latest condition of {}: {}",
                        isu.jia_isu_uuid,
                        e
                    );
                    e
                })?;
                Some(IsuCondition::new(&isu, reading, level))
            }
            None => None,
        };
        summaries.push(DeviceSummary::new(isu, latest));
    }

    Ok(summaries)
}
