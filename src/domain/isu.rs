// Isu device domain model
use super::condition::{ConditionReading, SeverityLevel};
use serde::{Deserialize, Serialize};

/// A registered device as held by the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isu {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub name: String,
    pub character: String,
    pub jia_user_id: String,
}

/// One classified reading of a device, as shown in listings and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsuCondition {
    pub jia_isu_uuid: String,
    pub isu_name: String,
    pub timestamp: i64,
    pub is_sitting: bool,
    pub condition: String,
    pub condition_level: SeverityLevel,
    pub message: String,
}

impl IsuCondition {
    pub fn new(isu: &Isu, reading: ConditionReading, level: SeverityLevel) -> Self {
        Self {
            jia_isu_uuid: reading.jia_isu_uuid,
            isu_name: isu.name.clone(),
            timestamp: reading.timestamp.timestamp(),
            is_sitting: reading.is_sitting,
            condition: reading.condition,
            condition_level: level,
            message: reading.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub name: String,
    pub character: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_isu_condition: Option<IsuCondition>,
}

impl DeviceSummary {
    pub fn new(isu: Isu, latest_isu_condition: Option<IsuCondition>) -> Self {
        Self {
            id: isu.id,
            jia_isu_uuid: isu.jia_isu_uuid,
            name: isu.name,
            character: isu.character,
            latest_isu_condition,
        }
    }
}

/// Public view of a single device, without owner or condition data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsuView {
    pub id: i64,
    pub jia_isu_uuid: String,
    pub name: String,
    pub character: String,
}

impl From<Isu> for IsuView {
    fn from(isu: Isu) -> Self {
        Self {
            id: isu.id,
            jia_isu_uuid: isu.jia_isu_uuid,
            name: isu.name,
            character: isu.character,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn isu() -> Isu {
        Isu {
            id: 7,
            jia_isu_uuid: "uuid-a".to_string(),
            name: "Isu A".to_string(),
            character: "いじっぱり".to_string(),
            jia_user_id: "owner".to_string(),
        }
    }

    #[test]
    fn test_latest_condition_serializes_level_lowercase() {
        let reading = ConditionReading {
            jia_isu_uuid: "uuid-a".to_string(),
            timestamp: Utc.with_ymd_and_hms(2021, 8, 1, 0, 0, 0).unwrap(),
            is_sitting: true,
            condition: "is_dirty=true;is_broken=false".to_string(),
            message: "dirty".to_string(),
        };
        let latest = IsuCondition::new(&isu(), reading, SeverityLevel::Warning);
        let json = serde_json::to_value(&latest).unwrap();

        assert_eq!(json["condition_level"], "warning");
        assert_eq!(json["isu_name"], "Isu A");
        assert_eq!(json["timestamp"], 1627776000);
    }

    #[test]
    fn test_summary_omits_missing_condition() {
        let summary = DeviceSummary::new(isu(), None);
        let json = serde_json::to_value(&summary).unwrap();

        assert!(json.get("latest_isu_condition").is_none());
        assert_eq!(json["jia_isu_uuid"], "uuid-a");
    }
}
