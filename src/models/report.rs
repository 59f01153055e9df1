//! Step reports submitted by clients, and their validation.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::PrefectureId;

/// Input validation failures. Always raised before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid uuid")]
    InvalidUuid,

    #[error("invalid prefectureId (must be 1–47)")]
    InvalidPrefectureId,

    #[error("invalid steps (must be ≥ 0)")]
    InvalidSteps,
}

impl ValidationError {
    /// Name of the offending request field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidUuid => "uuid",
            ValidationError::InvalidPrefectureId => "prefectureId",
            ValidationError::InvalidSteps => "steps",
        }
    }
}

/// A validated step report, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub uuid: String,
    pub prefecture_id: PrefectureId,
    pub steps: u64,
}

impl StepReport {
    /// Validate typed input. Fields are checked in order: uuid, prefectureId, steps.
    pub fn new(uuid: impl Into<String>, prefecture_id: i64, steps: i64) -> Result<Self, ValidationError> {
        let uuid = uuid.into();
        if uuid.is_empty() {
            return Err(ValidationError::InvalidUuid);
        }
        let prefecture_id = PrefectureId::new(prefecture_id)?;
        let steps = u64::try_from(steps).map_err(|_| ValidationError::InvalidSteps)?;

        Ok(Self {
            uuid,
            prefecture_id,
            steps,
        })
    }

    /// Validate an untyped JSON request body.
    ///
    /// Wrong JSON types are reported against the field they appear in rather
    /// than as a generic deserialization failure.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let uuid = match body.get("uuid") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ValidationError::InvalidUuid),
        };

        let prefecture_id = body
            .get("prefectureId")
            .and_then(whole_number)
            .and_then(|n| i64::try_from(n).ok())
            .ok_or(ValidationError::InvalidPrefectureId)
            .and_then(PrefectureId::new)?;

        let steps = body
            .get("steps")
            .and_then(whole_number)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or(ValidationError::InvalidSteps)?;

        Ok(Self {
            uuid,
            prefecture_id,
            steps,
        })
    }
}

/// Integral value of a JSON number; `None` for non-numbers and fractions.
fn whole_number(value: &Value) -> Option<i128> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i as i128);
    }
    if let Some(u) = n.as_u64() {
        return Some(u as i128);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e18 {
        Some(f as i128)
    } else {
        None
    }
}
