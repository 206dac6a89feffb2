// Condition readings and severity classification
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Literal marker counted by the classifier. Boolean flags are encoded as
/// `name=true` / `name=false` tokens in a single text column.
const TRUE_MARKER: &str = "=true";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionReading {
    pub jia_isu_uuid: String,
    pub timestamp: DateTime<Utc>,
    pub is_sitting: bool,
    pub condition: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Info,
    Warning,
    Critical,
}

impl SeverityLevel {
    /// Contribution of one reading to an hourly graph score.
    pub fn score(self) -> i64 {
        match self {
            SeverityLevel::Info => 3,
            SeverityLevel::Warning => 2,
            SeverityLevel::Critical => 1,
        }
    }
}

impl FromStr for SeverityLevel {
    type Err = UnknownLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(SeverityLevel::Info),
            "warning" => Ok(SeverityLevel::Warning),
            "critical" => Ok(SeverityLevel::Critical),
            other => Err(UnknownLevelError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition level `{0}`")]
pub struct UnknownLevelError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected warn count: {count}")]
pub struct ClassificationError {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionFormatError {
    #[error("empty condition")]
    Empty,
    #[error("malformed condition token `{0}`")]
    Token(String),
}

/// Classify a serialized flag string by the number of `=true` markers it holds.
///
/// This counts the raw substring rather than parsing tokens, so it stays
/// compatible with every encoding variant already persisted.
pub fn classify(condition: &str) -> Result<SeverityLevel, ClassificationError> {
    let count = condition.matches(TRUE_MARKER).count();
    match count {
        0 => Ok(SeverityLevel::Info),
        1 | 2 => Ok(SeverityLevel::Warning),
        3 => Ok(SeverityLevel::Critical),
        _ => Err(ClassificationError { count }),
    }
}

/// Split a condition string into `(name, value)` pairs.
/// Tokens are separated by `,` or `;` and must read `name=true` or `name=false`.
pub fn parse_flags(condition: &str) -> Result<Vec<(String, bool)>, ConditionFormatError> {
    if condition.trim().is_empty() {
        return Err(ConditionFormatError::Empty);
    }

    condition
        .split([',', ';'])
        .map(|token| {
            let (name, value) = token
                .split_once('=')
                .ok_or_else(|| ConditionFormatError::Token(token.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConditionFormatError::Token(token.to_string()));
            }
            match value.trim() {
                "true" => Ok((name.to_string(), true)),
                "false" => Ok((name.to_string(), false)),
                _ => Err(ConditionFormatError::Token(token.to_string())),
            }
        })
        .collect()
}

/// Names of the flags set to `true`, skipping tokens that do not parse.
pub fn true_flag_names(condition: &str) -> impl Iterator<Item = &str> {
    condition.split([',', ';']).filter_map(|token| {
        let (name, value) = token.split_once('=')?;
        let name = name.trim();
        (value.trim() == "true" && !name.is_empty()).then_some(name)
    })
}
