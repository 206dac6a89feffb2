// Trend service - Latest condition of every isu, grouped by character and level
use crate::application::condition_store::ConditionStore;
use crate::application::error::ServiceError;
use crate::domain::condition::{classify, SeverityLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendCondition {
    pub isu_id: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterTrend {
    pub character: String,
    pub info: Vec<TrendCondition>,
    pub warning: Vec<TrendCondition>,
    pub critical: Vec<TrendCondition>,
}

impl CharacterTrend {
    fn new(character: String) -> Self {
        Self {
            character,
            info: Vec::new(),
            warning: Vec::new(),
            critical: Vec::new(),
        }
    }

    fn push(&mut self, level: SeverityLevel, condition: TrendCondition) {
        match level {
            SeverityLevel::Info => self.info.push(condition),
            SeverityLevel::Warning => self.warning.push(condition),
            SeverityLevel::Critical => self.critical.push(condition),
        }
    }

    fn sort_newest_first(&mut self) {
        for list in [&mut self.info, &mut self.warning, &mut self.critical] {
            list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.isu_id.cmp(&b.isu_id)));
        }
    }
}

#[derive(Clone)]
pub struct TrendService {
    store: Arc<dyn ConditionStore>,
}

impl TrendService {
    pub fn new(store: Arc<dyn ConditionStore>) -> Self {
        Self { store }
    }

    /// One entry per character, sorted by character. An isu that never
    /// reported is left out of the level lists but its character still appears.
    pub async fn get_trend(&self) -> Result<Vec<CharacterTrend>, ServiceError> {
        let mut snapshot = self.store.snapshot().await?;
        let isus = snapshot.all_isus().await?;

        let mut trends: BTreeMap<String, CharacterTrend> = BTreeMap::new();
        for isu in isus {
            let latest = snapshot.latest_reading(&isu.jia_isu_uuid).await?;
            let trend = trends
                .entry(isu.character.clone())
                .or_insert_with(|| CharacterTrend::new(isu.character.clone()));

            if let Some(reading) = latest {
                let level = classify(&reading.condition)?;
                trend.push(
                    level,
                    TrendCondition {
                        isu_id: isu.id,
                        timestamp: reading.timestamp.timestamp(),
                    },
                );
            }
        }
        snapshot.finish().await?;

        Ok(trends
            .into_values()
            .map(|mut trend| {
                trend.sort_newest_first();
                trend
            })
            .collect())
    }
}
