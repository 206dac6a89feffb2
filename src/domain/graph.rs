// Graph domain model: hourly buckets and the dashboard series built from them
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Display value for "not recorded", distinct from a recorded zero.
pub const PLACEHOLDER: &str = "-";

const TIME_LABEL_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketData {
    pub score: i64,
    pub sitting: i64,
    pub detail: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub start_at: DateTime<Utc>,
    pub data: Option<BucketData>,
}

impl HourBucket {
    pub fn empty(start_at: DateTime<Utc>) -> Self {
        Self { start_at, data: None }
    }

    pub fn with_data(start_at: DateTime<Utc>, data: BucketData) -> Self {
        Self {
            start_at,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub score: String,
    pub is_dirty: String,
    pub is_overweight: String,
    pub is_broken: String,
    pub missing_data: String,
}

impl Tooltip {
    fn missing() -> Self {
        Self {
            score: PLACEHOLDER.to_string(),
            is_dirty: PLACEHOLDER.to_string(),
            is_overweight: PLACEHOLDER.to_string(),
            is_broken: PLACEHOLDER.to_string(),
            missing_data: PLACEHOLDER.to_string(),
        }
    }

    fn from_data(data: &BucketData) -> Self {
        let detail = |name: &str| match data.detail.get(name) {
            Some(&count) if count != 0 => count.to_string(),
            _ => PLACEHOLDER.to_string(),
        };

        Self {
            score: data.score.to_string(),
            is_dirty: detail("is_dirty"),
            is_overweight: detail("is_overweight"),
            is_broken: detail("is_broken"),
            missing_data: detail("missing_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphResult {
    #[serde(rename = "transition_data")]
    pub score_series: Vec<i64>,
    #[serde(rename = "sitting_data")]
    pub sitting_series: Vec<i64>,
    #[serde(rename = "time_categories")]
    pub time_labels: Vec<String>,
    #[serde(rename = "score")]
    pub overall_score: i64,
    #[serde(rename = "tooltip_data")]
    pub tooltips: Vec<Tooltip>,
}

/// Turn an ordered bucket sequence into parallel display series.
///
/// Every bucket yields exactly one entry in each series, so an hour without
/// readings still occupies its slot on the time axis. The overall score is
/// the floored mean of the score series, and 0 when there are no buckets.
pub fn aggregate(buckets: &[HourBucket], offset: &FixedOffset) -> GraphResult {
    let mut score_series = Vec::with_capacity(buckets.len());
    let mut sitting_series = Vec::with_capacity(buckets.len());
    let mut time_labels = Vec::with_capacity(buckets.len());
    let mut tooltips = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        match &bucket.data {
            Some(data) => {
                score_series.push(data.score);
                sitting_series.push(data.sitting);
                tooltips.push(Tooltip::from_data(data));
            }
            None => {
                score_series.push(0);
                sitting_series.push(0);
                tooltips.push(Tooltip::missing());
            }
        }

        time_labels.push(
            bucket
                .start_at
                .with_timezone(offset)
                .format(TIME_LABEL_FORMAT)
                .to_string(),
        );
    }

    let overall_score = if buckets.is_empty() {
        0
    } else {
        let total: i64 = score_series.iter().sum();
        total.div_euclid(buckets.len() as i64)
    };

    GraphResult {
        score_series,
        sitting_series,
        time_labels,
        overall_score,
        tooltips,
    }
}
