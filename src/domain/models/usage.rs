//! Account usage as reported by the agent backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage of a single model, when the backend breaks it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub model: String,
    pub used_percent: f64,
}

/// Result of one usage check. `allowed` gates admission of new tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub allowed: bool,
    pub account: Option<String>,
    pub five_hour_used_percent: Option<f64>,
    pub weekly_used_percent: Option<f64>,
    pub five_hour_resets_at: Option<DateTime<Utc>>,
    pub weekly_resets_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_model: Vec<ModelUsage>,
    /// Why the check failed or refused, if it did
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl UsageReport {
    /// A refusal carrying the failure reason.
    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            allowed: false,
            account: None,
            five_hour_used_percent: None,
            weekly_used_percent: None,
            five_hour_resets_at: None,
            weekly_resets_at: None,
            per_model: Vec::new(),
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    /// Report used when the check is switched off.
    pub fn unchecked() -> Self {
        Self { allowed: true, error: None, ..Self::denied("") }
    }

    /// Apply the configured ceilings on top of the backend's own verdict.
    pub fn apply_limits(mut self, max_five_hour_percent: f64, max_weekly_percent: f64) -> Self {
        if !self.allowed {
            return self;
        }
        if let Some(used) = self.five_hour_used_percent {
            if used >= max_five_hour_percent {
                self.allowed = false;
                self.error = Some(format!(
                    "five-hour usage {used:.1}% reached limit {max_five_hour_percent:.1}%"
                ));
                return self;
            }
        }
        if let Some(used) = self.weekly_used_percent {
            if used >= max_weekly_percent {
                self.allowed = false;
                self.error = Some(format!("weekly usage {used:.1}% reached limit {max_weekly_percent:.1}%"));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(five_hour: f64, weekly: f64) -> UsageReport {
        UsageReport {
            allowed: true,
            five_hour_used_percent: Some(five_hour),
            weekly_used_percent: Some(weekly),
            ..UsageReport::unchecked()
        }
    }

    #[test]
    fn test_limits_refuse_at_threshold() {
        assert!(report(40.0, 10.0).apply_limits(100.0, 100.0).allowed);

        let refused = report(80.0, 10.0).apply_limits(80.0, 100.0);
        assert!(!refused.allowed);
        assert!(refused.error.unwrap().contains("five-hour"));

        let refused = report(10.0, 95.0).apply_limits(100.0, 90.0);
        assert!(!refused.allowed);
        assert!(refused.error.unwrap().contains("weekly"));
    }

    #[test]
    fn test_denied_stays_denied() {
        let r = UsageReport::denied("auth file missing").apply_limits(100.0, 100.0);
        assert!(!r.allowed);
        assert_eq!(r.error.as_deref(), Some("auth file missing"));
    }
}
