//! Recurring compliance-task scheduler.
//!
//! Computes the next due date for a control task from its recurrence class,
//! then optimizes the candidate against the working calendar and the owner
//! load for that month. One `Scheduler` instance serves one tenant; the
//! internal mutex serializes schedule creation and completion updates so two
//! concurrent completions never balance against a stale view of the month.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::ComplianceCalendar;
use crate::config::SchedulerConfig;

/// Recurrence class of a control task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    OnEvent,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
            Frequency::OnEvent => "on-event",
        };
        f.write_str(s)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "annual" | "annually" | "yearly" => Ok(Frequency::Annual),
            "on-event" | "on_event" => Ok(Frequency::OnEvent),
            other => Err(format!("unknown frequency '{other}'")),
        }
    }
}

/// One recurring schedule for a control.
///
/// Created when a control is activated for operation, recomputed after every
/// task completion, and removed only when the control retires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub id: String,
    pub control_id: String,
    pub frequency: Frequency,
    pub owner_id: String,
    pub next_due: DateTime<Utc>,
    pub timezone: String,
    pub business_hours_only: bool,
    pub exclude_holidays: bool,
    pub load_balancing: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    schedules: HashMap<String, ScheduleRule>,
}

/// Per-tenant compliance-task scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    calendar: ComplianceCalendar,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, calendar: ComplianceCalendar) -> Self {
        Self {
            config,
            calendar,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Create and register a schedule for a control, computing the first
    /// optimized due date from `start`.
    pub async fn generate_schedule(
        &self,
        control_id: &str,
        frequency: Frequency,
        owner_id: &str,
        start: DateTime<Utc>,
    ) -> ScheduleRule {
        let mut state = self.state.lock().await;
        let candidate = next_due_from(frequency, start);
        let next_due = self.optimize(candidate, &state, true, true);

        let rule = ScheduleRule {
            id: format!("schedule-{}-{}", control_id, Uuid::new_v4()),
            control_id: control_id.to_string(),
            frequency,
            owner_id: owner_id.to_string(),
            next_due,
            timezone: self.config.default_timezone.clone(),
            business_hours_only: true,
            exclude_holidays: true,
            load_balancing: true,
        };

        info!(
            schedule_id = %rule.id,
            control_id,
            frequency = %frequency,
            next_due = %next_due,
            "schedule generated"
        );
        state.schedules.insert(rule.id.clone(), rule.clone());
        rule
    }

    /// Recompute the next due date after a task completion.
    ///
    /// An unknown schedule id is a silent no-op: completion events may race
    /// with control retirement.
    pub async fn update_schedule_after_completion(
        &self,
        schedule_id: &str,
        completion: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        let Some(rule) = state.schedules.get(schedule_id) else {
            debug!(schedule_id, "completion for unknown schedule ignored");
            return;
        };
        let candidate = next_due_from(rule.frequency, completion);
        let next_due = self.optimize(
            candidate,
            &state,
            rule.exclude_holidays,
            rule.load_balancing,
        );
        if let Some(rule) = state.schedules.get_mut(schedule_id) {
            rule.next_due = next_due;
            debug!(schedule_id, next_due = %next_due, "schedule advanced after completion");
        }
    }

    /// Schedules owned by `owner_id` due within `horizon_days`, ascending by
    /// due date.
    pub async fn owner_schedules(&self, owner_id: &str, horizon_days: i64) -> Vec<ScheduleRule> {
        let cutoff = Utc::now() + Duration::days(horizon_days);
        let state = self.state.lock().await;
        let mut rules: Vec<ScheduleRule> = state
            .schedules
            .values()
            .filter(|r| r.owner_id == owner_id && r.next_due <= cutoff)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.next_due);
        rules
    }

    pub async fn get(&self, schedule_id: &str) -> Option<ScheduleRule> {
        self.state.lock().await.schedules.get(schedule_id).cloned()
    }

    /// Drop every schedule belonging to a retired control. Returns the
    /// number removed.
    pub async fn remove_control_schedules(&self, control_id: &str) -> usize {
        let mut state = self.state.lock().await;
        let before = state.schedules.len();
        state.schedules.retain(|_, r| r.control_id != control_id);
        let removed = before - state.schedules.len();
        if removed > 0 {
            info!(control_id, removed, "schedules removed for retired control");
        }
        removed
    }

    /// Optimization pipeline, applied in order: weekend skip, holiday skip
    /// (re-checking weekends), then load balancing.
    fn optimize(
        &self,
        candidate: DateTime<Utc>,
        state: &SchedulerState,
        exclude_holidays: bool,
        load_balancing: bool,
    ) -> DateTime<Utc> {
        let mut date = candidate;

        while self.calendar.is_weekend(date.date_naive()) {
            date += Duration::days(1);
        }

        if exclude_holidays {
            while self.calendar.is_holiday(date.date_naive()) {
                date += Duration::days(1);
                // Holiday shift may land on a weekend.
                while self.calendar.is_weekend(date.date_naive()) {
                    date += Duration::days(1);
                }
            }
        }

        if load_balancing {
            date = self.balance_load(date, state);
        }

        date
    }

    /// Shift day-by-day, bounded, while the candidate day already carries
    /// the per-day ceiling of tasks for that month. If no acceptable day is
    /// found within the attempt bound, the pre-balance date wins so the
    /// function always terminates with a usable date.
    fn balance_load(&self, date: DateTime<Utc>, state: &SchedulerState) -> DateTime<Utc> {
        let day = date.date_naive();
        let tasks_on = |target: chrono::NaiveDate| {
            state
                .schedules
                .values()
                .filter(|r| r.next_due.date_naive() == target)
                .count()
        };

        if tasks_on(day) <= self.config.max_tasks_per_day {
            return date;
        }

        let mut shifted = date;
        for _ in 0..self.config.max_shift_attempts {
            shifted += Duration::days(1);
            let shifted_day = shifted.date_naive();
            if tasks_on(shifted_day) < self.config.max_tasks_per_day
                && self.calendar.is_working_day(shifted_day)
            {
                debug!(
                    from = %day,
                    to = %shifted_day,
                    "load balancing shifted due date"
                );
                return shifted;
            }
        }

        date
    }
}

/// Frequency-to-interval mapping. Unmapped classes (on-event) fall to the
/// 30-day default.
fn next_due_from(frequency: Frequency, from: DateTime<Utc>) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => from + Duration::days(1),
        Frequency::Weekly => from + Duration::days(7),
        Frequency::Monthly => from + Months::new(1),
        Frequency::Quarterly => from + Months::new(3),
        Frequency::Annual => from + Months::new(12),
        Frequency::OnEvent => from + Duration::days(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn frequency_mapping_uses_calendar_arithmetic() {
        let start = utc(2025, 1, 31);
        assert_eq!(next_due_from(Frequency::Daily, start).date_naive(), utc(2025, 2, 1).date_naive());
        assert_eq!(next_due_from(Frequency::Weekly, start).date_naive(), utc(2025, 2, 7).date_naive());
        // Jan 31 + 1 calendar month clamps to Feb 28.
        assert_eq!(
            next_due_from(Frequency::Monthly, start).date_naive(),
            utc(2025, 2, 28).date_naive()
        );
        assert_eq!(
            next_due_from(Frequency::Annual, start).date_naive(),
            utc(2026, 1, 31).date_naive()
        );
        assert_eq!(
            next_due_from(Frequency::OnEvent, start).date_naive(),
            utc(2025, 3, 2).date_naive()
        );
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Quarterly".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("on-event".parse::<Frequency>().unwrap(), Frequency::OnEvent);
        assert!("fortnightly".parse::<Frequency>().is_err());
    }
}
