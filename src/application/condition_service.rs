// Condition service - Ingests device readings and serves condition history
use crate::application::condition_store::ConditionStore;
use crate::application::error::ServiceError;
use crate::domain::condition::{classify, parse_flags, ConditionReading, SeverityLevel};
use crate::domain::isu::IsuCondition;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum number of readings returned by one history request.
const CONDITION_LIMIT: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct PostConditionRequest {
    pub is_sitting: bool,
    pub condition: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct ConditionQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub levels: HashSet<SeverityLevel>,
}

#[derive(Clone)]
pub struct ConditionService {
    store: Arc<dyn ConditionStore>,
}

impl ConditionService {
    pub fn new(store: Arc<dyn ConditionStore>) -> Self {
        Self { store }
    }

    /// Classified readings with `start_time <= timestamp < end_time`, newest
    /// first, keeping only the requested levels. At most 20 are returned.
    pub async fn get_conditions(
        &self,
        jia_user_id: &str,
        jia_isu_uuid: &str,
        query: ConditionQuery,
    ) -> Result<Vec<IsuCondition>, ServiceError> {
        let from = query.start_time.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let mut snapshot = self.store.snapshot().await?;
        let isu = snapshot
            .find_isu(jia_user_id, jia_isu_uuid)
            .await?
            .ok_or(ServiceError::NotFound("isu"))?;
        let readings = snapshot.readings(jia_isu_uuid, from, query.end_time).await?;
        snapshot.finish().await?;

        let mut conditions = Vec::new();
        for reading in readings.into_iter().rev() {
            let level = classify(&reading.condition)?;
            if query.levels.contains(&level) {
                conditions.push(IsuCondition::new(&isu, reading, level));
                if conditions.len() == CONDITION_LIMIT {
                    break;
                }
            }
        }
        Ok(conditions)
    }

    /// Validate the whole batch before writing any of it.
    pub async fn post_conditions(
        &self,
        jia_isu_uuid: &str,
        requests: Vec<PostConditionRequest>,
    ) -> Result<usize, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::InvalidInput("empty condition list".to_string()));
        }
        if !self.store.isu_exists(jia_isu_uuid).await? {
            return Err(ServiceError::NotFound("isu"));
        }

        let readings = requests
            .into_iter()
            .map(|req| to_reading(jia_isu_uuid, req))
            .collect::<Result<Vec<_>, _>>()?;

        let written = self.store.append_readings(&readings).await?;
        if written < readings.len() {
            tracing::debug!(
                "Skipped {} duplicate conditions for {}",
                readings.len() - written,
                jia_isu_uuid
            );
        }
        Ok(written)
    }
}

fn to_reading(jia_isu_uuid: &str, req: PostConditionRequest) -> Result<ConditionReading, ServiceError> {
    parse_flags(&req.condition).map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
    let timestamp = DateTime::from_timestamp(req.timestamp, 0)
        .ok_or_else(|| ServiceError::InvalidInput(format!("invalid timestamp: {}", req.timestamp)))?;

    Ok(ConditionReading {
        jia_isu_uuid: jia_isu_uuid.to_string(),
        timestamp,
        is_sitting: req.is_sitting,
        condition: req.condition,
        message: req.message,
    })
}
