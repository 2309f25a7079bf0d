//! Business calendars deciding which minutes count against an SLA.
//!
//! [`BusinessCalendar::is_business_time`] is the single predicate a calendar
//! service must answer. The interval helpers have minute-walking defaults so a
//! calendar that only knows the predicate still works; the bundled calendars
//! override them with interval arithmetic.

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc, Weekday,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlaError};

/// Upper bound on how far the default helpers walk before giving up.
const MAX_SCAN_MINUTES: i64 = 60 * 24 * 366 * 2;

/// Upper bound on how many days the weekly calendar scans for open windows.
const MAX_SCAN_DAYS: i64 = 366 * 5;

/// Decides whether an instant falls inside the SLA counting window.
pub trait BusinessCalendar: Send + Sync {
    /// Whether `instant` is inside business hours and not on a holiday.
    fn is_business_time(&self, instant: DateTime<Utc>) -> bool;

    /// Whole business minutes in `[start, end)`. Zero when `end <= start`.
    fn business_minutes_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        if end <= start {
            return 0;
        }
        let mut counted = 0;
        let mut cursor = start;
        let mut steps = 0;
        while cursor + Duration::minutes(1) <= end && steps < MAX_SCAN_MINUTES {
            if self.is_business_time(cursor) {
                counted += 1;
            }
            cursor += Duration::minutes(1);
            steps += 1;
        }
        counted
    }

    /// Instant at which `minutes` business minutes have elapsed since `start`.
    fn add_business_minutes(&self, start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        if minutes <= 0 {
            return start;
        }
        let mut counted = 0;
        let mut cursor = start;
        let mut steps = 0;
        while steps < MAX_SCAN_MINUTES {
            if self.is_business_time(cursor) {
                counted += 1;
            }
            cursor += Duration::minutes(1);
            steps += 1;
            if counted == minutes {
                break;
            }
        }
        cursor
    }
}

/// Counts every wall-clock minute.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOpenCalendar;

impl BusinessCalendar for AlwaysOpenCalendar {
    fn is_business_time(&self, _instant: DateTime<Utc>) -> bool {
        true
    }

    fn business_minutes_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        (end - start).num_minutes().max(0)
    }

    fn add_business_minutes(&self, start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        start + Duration::minutes(minutes.max(0))
    }
}

/// Daily opening window repeated on working days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Local opening time.
    pub open: NaiveTime,
    /// Local closing time (exclusive).
    pub close: NaiveTime,
    /// Days on which the window applies.
    pub working_days: Vec<Weekday>,
    /// Offset of the local zone from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            utc_offset_minutes: 0,
        }
    }
}

impl BusinessHours {
    /// Reject windows that could never count a minute.
    pub fn validate(&self) -> Result<()> {
        if self.open >= self.close {
            return Err(SlaError::Validation(format!(
                "business hours open ({}) must be before close ({})",
                self.open, self.close
            )));
        }
        if self.working_days.is_empty() {
            return Err(SlaError::Validation(
                "business hours need at least one working day".to_string(),
            ));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(SlaError::Validation(format!(
                "utc offset {} minutes is out of range",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

/// Weekly business hours with a holiday list.
#[derive(Debug, Clone)]
pub struct WeeklyBusinessCalendar {
    hours: BusinessHours,
    holidays: BTreeSet<NaiveDate>,
    offset: FixedOffset,
}

impl WeeklyBusinessCalendar {
    /// Build a calendar after validating the hours.
    pub fn new(hours: BusinessHours, holidays: impl IntoIterator<Item = NaiveDate>) -> Result<Self> {
        hours.validate()?;
        let offset = FixedOffset::east_opt(hours.utc_offset_minutes * 60).ok_or_else(|| {
            SlaError::Validation(format!(
                "utc offset {} minutes is out of range",
                hours.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            hours,
            holidays: holidays.into_iter().collect(),
            offset,
        })
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let shifted = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&shifted)
    }

    fn is_working_day(&self, date: NaiveDate) -> bool {
        self.hours.working_days.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Open window of `date` in local time, if it is a working day.
    fn window(&self, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.is_working_day(date)
            .then(|| (date.and_time(self.hours.open), date.and_time(self.hours.close)))
    }
}

impl BusinessCalendar for WeeklyBusinessCalendar {
    fn is_business_time(&self, instant: DateTime<Utc>) -> bool {
        let local = self.to_local(instant);
        match self.window(local.date()) {
            Some((open, close)) => local >= open && local < close,
            None => false,
        }
    }

    fn business_minutes_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        if end <= start {
            return 0;
        }
        let start = self.to_local(start);
        let end = self.to_local(end);

        let mut seconds = 0;
        let mut date = start.date();
        while date <= end.date() {
            if let Some((open, close)) = self.window(date) {
                let from = open.max(start);
                let to = close.min(end);
                if to > from {
                    seconds += (to - from).num_seconds();
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        seconds / 60
    }

    fn add_business_minutes(&self, start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        if minutes <= 0 {
            return start;
        }
        let mut remaining = Duration::minutes(minutes);
        let mut cursor = self.to_local(start);

        for _ in 0..MAX_SCAN_DAYS {
            let date = cursor.date();
            if let Some((open, close)) = self.window(date) {
                let from = open.max(cursor);
                if close > from {
                    let available = close - from;
                    if available >= remaining {
                        return self.to_utc(from + remaining);
                    }
                    remaining -= available;
                }
            }
            match date.succ_opt() {
                Some(next) => cursor = next.and_time(NaiveTime::MIN),
                None => break,
            }
        }
        self.to_utc(cursor)
    }
}
