//! Typed configuration for the orchestration core.
//!
//! Every knob has a production default; `CoreConfig::from_env` layers
//! `GRC_CORE_*` environment overrides on top for deployments that cannot
//! ship a config file.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub scheduler: SchedulerConfig,
    pub ccm: CcmConfig,
    pub containment: ContainmentConfig,
}

/// Scheduler calendar and load-balancing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ceiling of scheduled tasks per calendar day before load balancing
    /// shifts new work to another day.
    pub max_tasks_per_day: usize,
    /// Bound on day-by-day shift attempts; past this the original date wins.
    pub max_shift_attempts: u32,
    /// Default look-ahead window for owner schedule listings, in days.
    pub default_horizon_days: i64,
    /// IANA timezone name stamped on new schedule rules.
    pub default_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_day: 5,
            max_shift_attempts: 10,
            default_horizon_days: 30,
            default_timezone: "Asia/Riyadh".to_string(),
        }
    }
}

/// Continuous control monitoring loop knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcmConfig {
    /// Bound on a single connector health probe.
    pub probe_timeout_secs: u64,
    /// Bound on a single rule data query.
    pub query_timeout_secs: u64,
    /// Jitter applied to loop periods (0.0 to 1.0) so connector fleets do
    /// not probe in lockstep.
    pub jitter_percent: f64,
}

impl CcmConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for CcmConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            query_timeout_secs: 30,
            jitter_percent: 0.1,
        }
    }
}

/// Incident containment bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainmentConfig {
    /// Evidence lookback window over system logs and user actions, in hours.
    pub evidence_lookback_hours: i64,
    /// Row bound on captured system logs.
    pub max_log_rows: usize,
    /// Row bound on captured user actions.
    pub max_action_rows: usize,
    /// Bound on each notification dispatch.
    pub dispatch_timeout_secs: u64,
}

impl ContainmentConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

impl Default for ContainmentConfig {
    fn default() -> Self {
        Self {
            evidence_lookback_hours: 24,
            max_log_rows: 100,
            max_action_rows: 50,
            dispatch_timeout_secs: 15,
        }
    }
}

impl CoreConfig {
    /// Defaults overlaid with any `GRC_CORE_*` environment variables.
    ///
    /// Unparseable values are ignored in favor of the default rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("GRC_CORE_MAX_TASKS_PER_DAY") {
            config.scheduler.max_tasks_per_day = v;
        }
        if let Some(v) = env_parse::<u32>("GRC_CORE_MAX_SHIFT_ATTEMPTS") {
            config.scheduler.max_shift_attempts = v;
        }
        if let Some(v) = env_parse::<i64>("GRC_CORE_HORIZON_DAYS") {
            config.scheduler.default_horizon_days = v;
        }
        if let Ok(v) = env::var("GRC_CORE_TIMEZONE") {
            if !v.is_empty() {
                config.scheduler.default_timezone = v;
            }
        }
        if let Some(v) = env_parse::<u64>("GRC_CORE_PROBE_TIMEOUT_SECS") {
            config.ccm.probe_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u64>("GRC_CORE_QUERY_TIMEOUT_SECS") {
            config.ccm.query_timeout_secs = v;
        }
        if let Some(v) = env_parse::<i64>("GRC_CORE_EVIDENCE_LOOKBACK_HOURS") {
            config.containment.evidence_lookback_hours = v;
        }
        if let Some(v) = env_parse::<u64>("GRC_CORE_DISPATCH_TIMEOUT_SECS") {
            config.containment.dispatch_timeout_secs = v;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_bounds() {
        let config = CoreConfig::default();
        assert_eq!(config.scheduler.max_tasks_per_day, 5);
        assert_eq!(config.scheduler.max_shift_attempts, 10);
        assert_eq!(config.containment.evidence_lookback_hours, 24);
        assert_eq!(config.containment.max_log_rows, 100);
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("GRC_CORE_MAX_TASKS_PER_DAY", "7");
        let config = CoreConfig::from_env();
        assert_eq!(config.scheduler.max_tasks_per_day, 7);
        std::env::remove_var("GRC_CORE_MAX_TASKS_PER_DAY");
    }

    #[test]
    fn unparseable_env_falls_back_to_default() {
        std::env::set_var("GRC_CORE_MAX_SHIFT_ATTEMPTS", "not-a-number");
        let config = CoreConfig::from_env();
        assert_eq!(config.scheduler.max_shift_attempts, 10);
        std::env::remove_var("GRC_CORE_MAX_SHIFT_ATTEMPTS");
    }
}
