//! Compliance calendar: configured weekend days plus a supplied holiday list.
//!
//! Holiday dates arrive from outside the core (lunar-calendar computation is
//! an upstream responsibility); this type only answers "is this a working
//! day".

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Working-day calendar for schedule optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCalendar {
    weekend: Vec<Weekday>,
    holidays: BTreeSet<NaiveDate>,
}

impl Default for ComplianceCalendar {
    /// Friday/Saturday weekend, no holidays loaded.
    fn default() -> Self {
        Self {
            weekend: vec![Weekday::Fri, Weekday::Sat],
            holidays: BTreeSet::new(),
        }
    }
}

impl ComplianceCalendar {
    pub fn new(weekend: Vec<Weekday>, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            weekend,
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Replace the holiday list, e.g. on the yearly calendar refresh.
    pub fn set_holidays(&mut self, holidays: impl IntoIterator<Item = NaiveDate>) {
        self.holidays = holidays.into_iter().collect();
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        self.weekend.contains(&date.weekday())
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.is_weekend(date) && !self.is_holiday(date)
    }
}
