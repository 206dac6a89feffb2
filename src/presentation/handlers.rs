// HTTP request handlers
use crate::application::condition_service::{ConditionQuery, PostConditionRequest};
use crate::application::error::ServiceError;
use crate::application::graph_service::GraphResponse;
use crate::application::trend_service::CharacterTrend;
use crate::domain::condition::SeverityLevel;
use crate::domain::isu::{DeviceSummary, IsuCondition, IsuView};
use crate::presentation::app_state::AppState;
use crate::presentation::owner::Owner;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct GraphQuery {
    /// Unix seconds; the graph covers the local day containing it
    pub datetime: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct ConditionHistoryQuery {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub condition_level: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List the signed-in user's isus with their latest condition
pub async fn list_isus(
    Owner(jia_user_id): Owner,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceSummary>>, ServiceError> {
    let summaries = state.isu_service.list_isus(&jia_user_id).await?;
    Ok(Json(summaries))
}

pub async fn get_isu(
    Owner(jia_user_id): Owner,
    Path(jia_isu_uuid): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<IsuView>, ServiceError> {
    let isu = state.isu_service.get_isu(&jia_user_id, &jia_isu_uuid).await?;
    Ok(Json(isu))
}

/// Hourly graph of one isu for a local day
/// (`?datetime=<unix seconds>`, or `?date=YYYY-MM-DD`)
pub async fn get_isu_graph(
    Owner(jia_user_id): Owner,
    Path(jia_isu_uuid): Path<String>,
    Query(query): Query<GraphQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GraphResponse>, ServiceError> {
    let date = match (query.datetime.as_deref(), query.date.as_deref()) {
        (Some(raw), _) => state
            .graph_service
            .local_date(parse_unix_time("datetime", raw)?),
        (None, Some(raw)) => parse_date(raw)?,
        (None, None) => return Err(ServiceError::InvalidInput("missing: datetime".to_string())),
    };
    let graph = state
        .graph_service
        .get_graph(&jia_user_id, &jia_isu_uuid, date)
        .await?;
    Ok(Json(graph))
}

/// Condition history of one isu, newest first
pub async fn get_isu_conditions(
    Owner(jia_user_id): Owner,
    Path(jia_isu_uuid): Path<String>,
    Query(query): Query<ConditionHistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<IsuCondition>>, ServiceError> {
    let query = parse_condition_query(&query)?;
    let conditions = state
        .condition_service
        .get_conditions(&jia_user_id, &jia_isu_uuid, query)
        .await?;
    Ok(Json(conditions))
}

pub async fn get_trend(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CharacterTrend>>, ServiceError> {
    let trend = state.trend_service.get_trend().await?;
    Ok(Json(trend))
}

/// Accept condition readings posted by a device
pub async fn post_isu_condition(
    Path(jia_isu_uuid): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(requests): Json<Vec<PostConditionRequest>>,
) -> Result<StatusCode, ServiceError> {
    state
        .condition_service
        .post_conditions(&jia_isu_uuid, requests)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

fn parse_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ServiceError::InvalidInput(format!("bad format: date `{}`", raw)))
}

fn parse_unix_time(name: &str, raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ServiceError::InvalidInput(format!("bad format: {} `{}`", name, raw)))
}

fn parse_condition_query(query: &ConditionHistoryQuery) -> Result<ConditionQuery, ServiceError> {
    let end_time = query
        .end_time
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidInput("missing: end_time".to_string()))
        .and_then(|raw| parse_unix_time("end_time", raw))?;
    let start_time = query
        .start_time
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_unix_time("start_time", raw))
        .transpose()?;

    let raw_levels = query
        .condition_level
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("missing: condition_level".to_string()))?;
    let levels = raw_levels
        .split(',')
        .map(|level| level.parse::<SeverityLevel>())
        .collect::<Result<HashSet<_>, _>>()
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

    Ok(ConditionQuery {
        start_time,
        end_time,
        levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2021-08-01").unwrap(),
            NaiveDate::from_ymd_opt(2021, 8, 1).unwrap()
        );
        assert!(matches!(parse_date("2021/08/01"), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(parse_date("2021-02-30"), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_unix_time() {
        assert_eq!(
            parse_unix_time("datetime", "1627743600").unwrap(),
            DateTime::from_timestamp(1627743600, 0).unwrap()
        );
        assert!(parse_unix_time("datetime", "2021-08-01").is_err());
        assert!(parse_unix_time("datetime", "").is_err());
    }

    fn history(start: Option<&str>, end: Option<&str>, levels: Option<&str>) -> ConditionHistoryQuery {
        ConditionHistoryQuery {
            start_time: start.map(str::to_string),
            end_time: end.map(str::to_string),
            condition_level: levels.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_condition_query() {
        let query =
            parse_condition_query(&history(None, Some("1627830000"), Some("info,critical"))).unwrap();
        assert!(query.start_time.is_none());
        assert_eq!(query.end_time.timestamp(), 1627830000);
        assert!(query.levels.contains(&SeverityLevel::Info));
        assert!(query.levels.contains(&SeverityLevel::Critical));
        assert!(!query.levels.contains(&SeverityLevel::Warning));

        let query =
            parse_condition_query(&history(Some("1627776000"), Some("1627830000"), Some("warning")))
                .unwrap();
        assert_eq!(query.start_time.unwrap().timestamp(), 1627776000);
    }

    #[test]
    fn test_parse_condition_query_rejects_bad_input() {
        let bad = [
            history(None, None, Some("info")),
            history(None, Some("soon"), Some("info")),
            history(Some("x"), Some("1627830000"), Some("info")),
            history(None, Some("1627830000"), None),
            history(None, Some("1627830000"), Some("info,fatal")),
        ];
        for query in &bad {
            assert!(matches!(
                parse_condition_query(query),
                Err(ServiceError::InvalidInput(_))
            ));
        }
    }
}
