//! Calendar facts injected into the rewrite prompt

use chrono::{Datelike, Local, NaiveDate};

/// Current date and academic years, pre-formatted for prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalContext {
    /// e.g. "October 18, 2026"
    pub today: String,
    /// e.g. "2026-2027"
    pub academic_year: String,
    /// e.g. "2025-2026"
    pub previous_academic_year: String,
    /// Month name the academic year starts in
    pub start_month: String,
}

impl TemporalContext {
    /// Context for the local current date
    pub fn now(start_month: u32) -> Self {
        Self::for_date(Local::now().date_naive(), start_month)
    }

    /// Context for a fixed date; `start_month` is 1-based
    pub fn for_date(date: NaiveDate, start_month: u32) -> Self {
        let start_month = start_month.clamp(1, 12);
        let first_year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };

        let start_month_name = NaiveDate::from_ymd_opt(2000, start_month, 1)
            .map(|d| d.format("%B").to_string())
            .unwrap_or_default();

        Self {
            today: date.format("%B %-d, %Y").to_string(),
            academic_year: format!("{}-{}", first_year, first_year + 1),
            previous_academic_year: format!("{}-{}", first_year - 1, first_year),
            start_month: start_month_name,
        }
    }
}
