// Graph service - Builds hourly buckets for a day and aggregates them
use crate::application::condition_store::ConditionStore;
use crate::application::error::ServiceError;
use crate::domain::condition::{classify, true_flag_names, ClassificationError, ConditionReading};
use crate::domain::graph::{aggregate, BucketData, GraphResult, HourBucket};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const HOURS_PER_DAY: i64 = 24;
const DAY_LABEL_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub day: String,
    #[serde(flatten)]
    pub graph: GraphResult,
}

#[derive(Clone)]
pub struct GraphService {
    store: Arc<dyn ConditionStore>,
    offset: FixedOffset,
}

impl GraphService {
    pub fn new(store: Arc<dyn ConditionStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// The local calendar day containing `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub async fn get_graph(
        &self,
        jia_user_id: &str,
        jia_isu_uuid: &str,
        date: NaiveDate,
    ) -> Result<GraphResponse, ServiceError> {
        let start = day_start(date, &self.offset)?;
        let end = start + Duration::hours(HOURS_PER_DAY);

        let mut snapshot = self.store.snapshot().await?;
        if snapshot.find_isu(jia_user_id, jia_isu_uuid).await?.is_none() {
            return Err(ServiceError::NotFound("isu"));
        }
        let readings = snapshot.readings(jia_isu_uuid, start, end).await?;
        snapshot.finish().await?;

        tracing::debug!(
            "Building graph for {} on {} from {} readings",
            jia_isu_uuid,
            date,
            readings.len()
        );

        let buckets = build_hour_buckets(&readings, start, HOURS_PER_DAY)?;
        Ok(GraphResponse {
            day: date.format(DAY_LABEL_FORMAT).to_string(),
            graph: aggregate(&buckets, &self.offset),
        })
    }
}

fn day_start(date: NaiveDate, offset: &FixedOffset) -> Result<DateTime<Utc>, ServiceError> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|start| start.with_timezone(&Utc))
        .ok_or_else(|| ServiceError::InvalidInput(format!("unsupported date: {}", date)))
}

/// Group ascending readings into `hours` consecutive one-hour buckets from `start`.
/// Readings outside the window are ignored.
pub fn build_hour_buckets(
    readings: &[ConditionReading],
    start: DateTime<Utc>,
    hours: i64,
) -> Result<Vec<HourBucket>, ClassificationError> {
    let mut slots: Vec<Vec<&ConditionReading>> = (0..hours).map(|_| Vec::new()).collect();
    for reading in readings {
        let offset = reading.timestamp - start;
        if offset < Duration::zero() {
            continue;
        }
        let index = offset.num_hours();
        if index < hours {
            slots[index as usize].push(reading);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            let start_at = start + Duration::hours(i as i64);
            if slot.is_empty() {
                Ok(HourBucket::empty(start_at))
            } else {
                Ok(HourBucket::with_data(start_at, bucket_data(&slot)?))
            }
        })
        .collect()
}

/// Score is the mean level score scaled to 0..=100; sitting is a percentage.
fn bucket_data(readings: &[&ConditionReading]) -> Result<BucketData, ClassificationError> {
    let count = readings.len() as i64;
    let mut raw_score = 0;
    let mut sitting = 0;
    let mut detail = BTreeMap::new();

    for reading in readings {
        raw_score += classify(&reading.condition)?.score();
        if reading.is_sitting {
            sitting += 1;
        }
        for name in true_flag_names(&reading.condition) {
            *detail.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    Ok(BucketData {
        score: raw_score * 100 / 3 / count,
        sitting: sitting * 100 / count,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::isu::Isu;
    use crate::infrastructure::memory_store::{Fixture, MemoryStore};

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn day_start_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 7, 31, 15, 0, 0).unwrap()
    }

    fn reading(minutes: i64, is_sitting: bool, condition: &str) -> ConditionReading {
        ConditionReading {
            jia_isu_uuid: "A".to_string(),
            timestamp: day_start_utc() + Duration::minutes(minutes),
            is_sitting,
            condition: condition.to_string(),
            message: String::new(),
        }
    }

    const CLEAN: &str = "is_dirty=false,is_overweight=false,is_broken=false";
    const DIRTY: &str = "is_dirty=true,is_overweight=false,is_broken=false";
    const ALL_BAD: &str = "is_dirty=true,is_overweight=true,is_broken=true";

    #[test]
    fn test_buckets_cover_every_hour() {
        let readings = vec![reading(10, true, CLEAN), reading(5 * 60 + 30, false, DIRTY)];
        let buckets = build_hour_buckets(&readings, day_start_utc(), 24).unwrap();

        assert_eq!(buckets.len(), 24);
        assert!(buckets[0].data.is_some());
        assert!(buckets[1].data.is_none());
        assert!(buckets[5].data.is_some());
        assert_eq!(buckets[5].start_at, day_start_utc() + Duration::hours(5));
    }

    #[test]
    fn test_bucket_scoring() {
        let readings = vec![
            reading(0, true, CLEAN),
            reading(10, false, DIRTY),
            reading(20, false, ALL_BAD),
        ];
        let buckets = build_hour_buckets(&readings, day_start_utc(), 1).unwrap();
        let data = buckets[0].data.as_ref().unwrap();

        // (3 + 2 + 1) * 100 / 3 / 3
        assert_eq!(data.score, 66);
        assert_eq!(data.sitting, 33);
        assert_eq!(data.detail.get("is_dirty"), Some(&2));
        assert_eq!(data.detail.get("is_broken"), Some(&1));
    }

    #[test]
    fn test_readings_outside_window_are_ignored() {
        let readings = vec![reading(-1, true, CLEAN), reading(24 * 60, true, CLEAN)];
        let buckets = build_hour_buckets(&readings, day_start_utc(), 24).unwrap();

        assert!(buckets.iter().all(|b| b.data.is_none()));
    }

    #[test]
    fn test_unclassifiable_reading_fails() {
        let readings = vec![reading(0, true, "a=true,b=true,c=true,d=true")];
        assert!(build_hour_buckets(&readings, day_start_utc(), 24).is_err());
    }

    fn service(conditions: Vec<ConditionReading>) -> GraphService {
        let isu = Isu {
            id: 1,
            jia_isu_uuid: "A".to_string(),
            name: "A".to_string(),
            character: "ようき".to_string(),
            jia_user_id: "owner".to_string(),
        };
        let store = MemoryStore::from_fixture(Fixture {
            isus: vec![isu],
            conditions,
        });
        GraphService::new(Arc::new(store), jst())
    }

    #[tokio::test]
    async fn test_get_graph_for_local_day() {
        let service = service(vec![reading(0, true, CLEAN), reading(60 + 1, false, ALL_BAD)]);
        let date = NaiveDate::from_ymd_opt(2021, 8, 1).unwrap();
        let response = service.get_graph("owner", "A", date).await.unwrap();

        assert_eq!(response.day, "2021-08-01");
        assert_eq!(response.graph.score_series.len(), 24);
        assert_eq!(response.graph.score_series[0], 100);
        assert_eq!(response.graph.score_series[1], 33);
        assert_eq!(response.graph.sitting_series[0], 100);
        assert_eq!(response.graph.time_labels[0], "00:00");
        // (100 + 33) / 24
        assert_eq!(response.graph.overall_score, 5);
        assert_eq!(response.graph.tooltips[1].is_overweight, "1");
        assert_eq!(response.graph.tooltips[2].score, "-");
    }

    #[test]
    fn test_local_date_uses_display_offset() {
        let service = service(vec![]);

        // 2021-07-31 15:00 UTC is 2021-08-01 00:00 +09:00
        let at = Utc.with_ymd_and_hms(2021, 7, 31, 15, 0, 0).unwrap();
        assert_eq!(service.local_date(at), NaiveDate::from_ymd_opt(2021, 8, 1).unwrap());

        let at = Utc.with_ymd_and_hms(2021, 7, 31, 14, 59, 59).unwrap();
        assert_eq!(service.local_date(at), NaiveDate::from_ymd_opt(2021, 7, 31).unwrap());
    }

    #[tokio::test]
    async fn test_get_graph_unknown_isu() {
        let service = service(vec![]);
        let date = NaiveDate::from_ymd_opt(2021, 8, 1).unwrap();

        assert!(matches!(
            service.get_graph("owner", "B", date).await,
            Err(ServiceError::NotFound("isu"))
        ));
        assert!(matches!(
            service.get_graph("intruder", "A", date).await,
            Err(ServiceError::NotFound("isu"))
        ));
    }
}
