//! Deadline arithmetic over business calendars.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calendar::{AlwaysOpenCalendar, BusinessCalendar, BusinessHours, WeeklyBusinessCalendar};
use crate::config::CalendarKind;
use crate::services::sla_definition::SlaDefinition;
use crate::ticket::Ticket;
use crate::types::DeadlineKind;

/// Response and resolution deadlines of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaDeadlines {
    pub response: DateTime<Utc>,
    pub resolution: DateTime<Utc>,
}

impl SlaDeadlines {
    #[must_use]
    pub fn get(&self, kind: DeadlineKind) -> DateTime<Utc> {
        match kind {
            DeadlineKind::Response => self.response,
            DeadlineKind::Resolution => self.resolution,
        }
    }
}

/// Computes deadlines and elapsed/remaining time for SLA definitions.
///
/// Definitions carrying their own business hours are counted on a
/// [`WeeklyBusinessCalendar`]; all others use the default calendar.
#[derive(Clone)]
pub struct SlaDeadlineCalculator {
    default_calendar: Arc<dyn BusinessCalendar>,
}

impl SlaDeadlineCalculator {
    /// Create a calculator with an explicit default calendar.
    pub fn new(default_calendar: Arc<dyn BusinessCalendar>) -> Self {
        Self { default_calendar }
    }

    /// Create a calculator for a configured calendar kind.
    #[must_use]
    pub fn for_kind(kind: CalendarKind) -> Self {
        let calendar: Arc<dyn BusinessCalendar> = match kind {
            CalendarKind::AlwaysOpen => Arc::new(AlwaysOpenCalendar),
            CalendarKind::BusinessHours => {
                match WeeklyBusinessCalendar::new(BusinessHours::default(), []) {
                    Ok(calendar) => Arc::new(calendar),
                    Err(e) => {
                        warn!(error = %e, "Default business hours rejected, counting wall clock");
                        Arc::new(AlwaysOpenCalendar)
                    }
                }
            }
        };
        Self::new(calendar)
    }

    /// Calendar that governs a definition.
    #[must_use]
    pub fn calendar_for(&self, definition: &SlaDefinition) -> Arc<dyn BusinessCalendar> {
        let Some(hours) = &definition.business_hours else {
            return Arc::clone(&self.default_calendar);
        };
        match WeeklyBusinessCalendar::new(hours.clone(), definition.holidays.iter().copied()) {
            Ok(calendar) => Arc::new(calendar),
            Err(e) => {
                warn!(
                    sla_definition_id = %definition.id,
                    error = %e,
                    "Invalid business hours on SLA definition, using default calendar"
                );
                Arc::clone(&self.default_calendar)
            }
        }
    }

    /// Deadlines measured from the ticket's creation.
    #[must_use]
    pub fn compute_deadlines(&self, ticket: &Ticket, definition: &SlaDefinition) -> SlaDeadlines {
        let calendar = self.calendar_for(definition);
        SlaDeadlines {
            response: calendar.add_business_minutes(
                ticket.created_at,
                i64::from(definition.response_time_minutes),
            ),
            resolution: calendar.add_business_minutes(
                ticket.created_at,
                i64::from(definition.resolution_time_minutes),
            ),
        }
    }

    /// Business minutes in `[start, end)`.
    #[must_use]
    pub fn elapsed_business_minutes(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calendar: &dyn BusinessCalendar,
    ) -> i64 {
        calendar.business_minutes_between(start, end)
    }

    /// Remaining share of the budget, `100 * (deadline - now) / (deadline - created_at)`.
    ///
    /// Returns `None` once `now` has reached the deadline, or when the budget
    /// window is empty.
    #[must_use]
    pub fn remaining_percentage(
        deadline: DateTime<Utc>,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        calendar: &dyn BusinessCalendar,
    ) -> Option<f64> {
        if now >= deadline {
            return None;
        }
        let total = calendar.business_minutes_between(created_at, deadline);
        if total <= 0 {
            return None;
        }
        let remaining = calendar.business_minutes_between(now.max(created_at), deadline);
        Some(100.0 * remaining as f64 / total as f64)
    }
}

impl Default for SlaDeadlineCalculator {
    fn default() -> Self {
        Self::for_kind(CalendarKind::AlwaysOpen)
    }
}
