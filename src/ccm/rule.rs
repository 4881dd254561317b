//! Monitoring rule model and evaluation logic.
//!
//! Evaluation is pure: aggregation and threshold comparison take data in and
//! hand a verdict back, so the semantics are testable without connectors or
//! timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::connector::QuerySpec;

/// Aggregation applied to the `value` field of queried rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

/// Warning/critical thresholds an aggregated value is compared against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

/// How often a rule's evaluation loop polls, and how eagerly warning-level
/// findings alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCadence {
    Immediate,
    Daily,
    Weekly,
}

impl AlertCadence {
    /// Poll interval for the evaluation loop. These are poll periods, not
    /// alert-delivery delays.
    pub fn poll_interval(&self) -> Duration {
        match self {
            AlertCadence::Immediate => Duration::from_secs(60),
            AlertCadence::Daily => Duration::from_secs(3600),
            AlertCadence::Weekly => Duration::from_secs(86400),
        }
    }
}

/// Binds one control to one connector with a query, thresholds, and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRule {
    pub id: String,
    pub control_id: String,
    pub connector_id: String,
    pub query: QuerySpec,
    pub aggregation: Aggregation,
    pub thresholds: Thresholds,
    pub alert_cadence: AlertCadence,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// Verdict of one evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub value: f64,
    pub level: AlertLevel,
    pub should_alert: bool,
    /// 0-100 normalized severity of the threshold breach.
    pub anomaly_score: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Aggregate the `value` field across rows. Rows without a numeric `value`
/// contribute zero; an empty row set aggregates to zero.
pub fn aggregate(rows: &[Value], aggregation: Aggregation) -> f64 {
    let values = || rows.iter().map(row_value);
    match aggregation {
        Aggregation::Count => rows.len() as f64,
        Aggregation::Sum => values().sum(),
        Aggregation::Avg => {
            if rows.is_empty() {
                0.0
            } else {
                values().sum::<f64>() / rows.len() as f64
            }
        }
        Aggregation::Max => values().fold(0.0, f64::max),
        Aggregation::Min => {
            if rows.is_empty() {
                0.0
            } else {
                values().fold(f64::INFINITY, f64::min)
            }
        }
    }
}

fn row_value(row: &Value) -> f64 {
    row.get("value").and_then(Value::as_f64).unwrap_or(0.0)
}

/// Compare an aggregated value against thresholds.
///
/// Critical breaches always alert. Warning breaches alert only at the
/// immediate cadence; daily/weekly rules suppress the individual warning
/// event and rely on their own cycle period.
pub fn evaluate(
    value: f64,
    thresholds: &Thresholds,
    cadence: AlertCadence,
    evaluated_at: DateTime<Utc>,
) -> RuleEvaluation {
    let (level, should_alert) = if value >= thresholds.critical {
        (AlertLevel::Critical, true)
    } else if value >= thresholds.warning {
        (AlertLevel::Warning, cadence == AlertCadence::Immediate)
    } else {
        (AlertLevel::Info, false)
    };

    RuleEvaluation {
        value,
        level,
        should_alert,
        anomaly_score: anomaly_score(value, thresholds),
        evaluated_at,
    }
}

/// Normalized 0-100 severity of a threshold breach: scaled against the
/// critical threshold when breached, capped at 80 for warning-only breaches,
/// zero below warning.
pub fn anomaly_score(value: f64, thresholds: &Thresholds) -> f64 {
    if value >= thresholds.critical {
        (value / thresholds.critical * 100.0).min(100.0)
    } else if value >= thresholds.warning {
        (value / thresholds.warning * 80.0).min(80.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| json!({ "value": v })).collect()
    }

    #[test]
    fn aggregation_functions() {
        let data = rows(&[2.0, 4.0, 6.0]);
        assert_eq!(aggregate(&data, Aggregation::Count), 3.0);
        assert_eq!(aggregate(&data, Aggregation::Sum), 12.0);
        assert_eq!(aggregate(&data, Aggregation::Avg), 4.0);
        assert_eq!(aggregate(&data, Aggregation::Max), 6.0);
        assert_eq!(aggregate(&data, Aggregation::Min), 2.0);
    }

    #[test]
    fn empty_rows_aggregate_to_zero() {
        for agg in [
            Aggregation::Count,
            Aggregation::Sum,
            Aggregation::Avg,
            Aggregation::Max,
            Aggregation::Min,
        ] {
            assert_eq!(aggregate(&[], agg), 0.0);
        }
    }

    #[test]
    fn rows_without_value_field_contribute_zero() {
        let data = vec![json!({ "value": 5.0 }), json!({ "other": 1 })];
        assert_eq!(aggregate(&data, Aggregation::Sum), 5.0);
        assert_eq!(aggregate(&data, Aggregation::Count), 2.0);
    }

    #[test]
    fn critical_breach_always_alerts() {
        let thresholds = Thresholds { warning: 50.0, critical: 100.0 };
        let eval = evaluate(120.0, &thresholds, AlertCadence::Weekly, Utc::now());
        assert_eq!(eval.level, AlertLevel::Critical);
        assert!(eval.should_alert);
        assert_eq!(eval.anomaly_score, 100.0);
    }

    #[test]
    fn warning_breach_alerts_only_at_immediate_cadence() {
        let thresholds = Thresholds { warning: 50.0, critical: 100.0 };

        let weekly = evaluate(60.0, &thresholds, AlertCadence::Weekly, Utc::now());
        assert_eq!(weekly.level, AlertLevel::Warning);
        assert!(!weekly.should_alert);

        let immediate = evaluate(60.0, &thresholds, AlertCadence::Immediate, Utc::now());
        assert_eq!(immediate.level, AlertLevel::Warning);
        assert!(immediate.should_alert);
        assert_eq!(immediate.anomaly_score, 80.0);
    }

    #[test]
    fn below_warning_is_informational() {
        let thresholds = Thresholds { warning: 50.0, critical: 100.0 };
        let eval = evaluate(10.0, &thresholds, AlertCadence::Immediate, Utc::now());
        assert_eq!(eval.level, AlertLevel::Info);
        assert!(!eval.should_alert);
        assert_eq!(eval.anomaly_score, 0.0);
    }

    #[test]
    fn anomaly_score_scales_within_band() {
        let thresholds = Thresholds { warning: 50.0, critical: 100.0 };
        // 55/50*80 = 88, capped at 80.
        assert_eq!(anomaly_score(55.0, &thresholds), 80.0);
        // Exactly at critical.
        assert_eq!(anomaly_score(100.0, &thresholds), 100.0);
    }

    #[test]
    fn poll_intervals_follow_cadence() {
        assert_eq!(AlertCadence::Immediate.poll_interval().as_secs(), 60);
        assert_eq!(AlertCadence::Daily.poll_interval().as_secs(), 3600);
        assert_eq!(AlertCadence::Weekly.poll_interval().as_secs(), 86400);
    }
}
