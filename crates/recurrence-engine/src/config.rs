//! Tunable limits for expansion and range validation.
//!
//! Both structs deserialize with per-field defaults, so a partial config
//! document only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, Result};

/// Safety ceiling applied to every expansion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionLimits {
    /// Maximum occurrences produced by a single expansion call.
    pub max_occurrences: u32,
    /// No occurrence may start later than the anchor plus this many years.
    pub max_span_years: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_occurrences: 10_000,
            max_span_years: 100,
        }
    }
}

impl ExpansionLimits {
    /// Check that the limits can bound an expansion at all.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidConfig`] if either ceiling is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_occurrences == 0 {
            return Err(RecurrenceError::InvalidConfig(
                "max_occurrences must be at least 1".to_string(),
            ));
        }
        if self.max_span_years == 0 {
            return Err(RecurrenceError::InvalidConfig(
                "max_span_years must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Business limits on the ranges callers may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeLimits {
    /// Longest generic date range, in days.
    pub max_range_days: i64,
    /// Longest "upcoming events" look-ahead, in days.
    pub max_upcoming_days: i64,
    /// Longest reminder due-check look-ahead, in minutes.
    pub max_reminder_lookahead_minutes: i64,
    /// Event queries may not end later than now plus this many years.
    pub event_horizon_years: u32,
    /// View queries (day/week/month) may not end later than now plus this many years.
    pub view_horizon_years: u32,
}

impl Default for RangeLimits {
    fn default() -> Self {
        Self {
            max_range_days: 366,
            max_upcoming_days: 90,
            max_reminder_lookahead_minutes: 60,
            event_horizon_years: 10,
            view_horizon_years: 50,
        }
    }
}

impl RangeLimits {
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidConfig`] if any limit is not positive.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_range_days", self.max_range_days),
            ("max_upcoming_days", self.max_upcoming_days),
            (
                "max_reminder_lookahead_minutes",
                self.max_reminder_lookahead_minutes,
            ),
            ("event_horizon_years", i64::from(self.event_horizon_years)),
            ("view_horizon_years", i64::from(self.view_horizon_years)),
        ];
        for (name, value) in checks {
            if value < 1 {
                return Err(RecurrenceError::InvalidConfig(format!(
                    "{name} must be at least 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Combined configuration document, as loaded by front ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub expansion: ExpansionLimits,
    pub ranges: RangeLimits,
}

impl EngineConfig {
    /// Parse a JSON config document and validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidConfig`] if the document is not valid
    /// JSON for this shape or any limit fails validation.
    pub fn from_json(source: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(source)
            .map_err(|e| RecurrenceError::InvalidConfig(e.to_string()))?;
        config.expansion.validate()?;
        config.ranges.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_business_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.expansion.max_occurrences, 10_000);
        assert_eq!(config.expansion.max_span_years, 100);
        assert_eq!(config.ranges.max_range_days, 366);
        assert_eq!(config.ranges.max_upcoming_days, 90);
        assert_eq!(config.ranges.max_reminder_lookahead_minutes, 60);
        assert_eq!(config.ranges.event_horizon_years, 10);
        assert_eq!(config.ranges.view_horizon_years, 50);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"expansion": {"max_occurrences": 500}}"#).unwrap();
        assert_eq!(config.expansion.max_occurrences, 500);
        assert_eq!(config.expansion.max_span_years, 100);
        assert_eq!(config.ranges, RangeLimits::default());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let err = EngineConfig::from_json(r#"{"expansion": {"max_occurrences": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("max_occurrences"), "got: {err}");
    }

    #[test]
    fn test_negative_range_limit_rejected() {
        let err = EngineConfig::from_json(r#"{"ranges": {"max_range_days": -1}}"#).unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = EngineConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid config"), "got: {err}");
    }
}
