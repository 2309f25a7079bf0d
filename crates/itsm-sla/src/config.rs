//! Engine configuration management.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use itsm_core::UserId;

use crate::error::{Result, SlaError};

/// Escalation sweep period (5 minutes).
pub const DEFAULT_ESCALATION_INTERVAL_SECS: u64 = 300;

/// SLA monitoring period.
pub const DEFAULT_SLA_MONITOR_INTERVAL_SECS: u64 = 60;

/// Bound on a single notification call.
pub const DEFAULT_NOTIFICATION_TIMEOUT_MS: u64 = 5000;

/// Age after which an active ticket gets a long-pending reminder (24 hours).
pub const DEFAULT_LONG_PENDING_MINUTES: u32 = 24 * 60;

/// Age after which an unassigned ticket gets a reminder (2 hours).
pub const DEFAULT_UNASSIGNED_MINUTES: u32 = 120;

/// Calendar used when an SLA definition carries no business hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarKind {
    /// Every wall-clock minute counts.
    #[default]
    AlwaysOpen,
    /// Monday to Friday, 09:00 to 18:00 UTC.
    BusinessHours,
}

impl FromStr for CalendarKind {
    type Err = SlaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "always_open" | "24x7" => Ok(Self::AlwaysOpen),
            "business_hours" => Ok(Self::BusinessHours),
            _ => Err(SlaError::Config {
                var: "ITSM_DEFAULT_CALENDAR".to_string(),
                reason: format!("Unknown calendar: {s}"),
            }),
        }
    }
}

/// Runtime settings for the lifecycle engine and its background jobs.
#[derive(Debug, Clone)]
pub struct SlaEngineConfig {
    /// Period of the automatic escalation sweep.
    pub escalation_interval: Duration,
    /// Period of the SLA monitoring pass.
    pub sla_monitor_interval: Duration,
    /// Upper bound on each notification sink call.
    pub notification_timeout: Duration,
    /// Assignee used when no assignment rule matches.
    pub default_assignee: Option<UserId>,
    /// Calendar for definitions without their own business hours.
    pub default_calendar: CalendarKind,
    /// Minutes after creation before a long-pending reminder is sent.
    pub long_pending_minutes: u32,
    /// Minutes after creation before an unassigned reminder is sent.
    pub unassigned_minutes: u32,
    /// Users who receive ticket reminders alongside the ticket's own people.
    pub supervisors: Vec<UserId>,
}

impl Default for SlaEngineConfig {
    fn default() -> Self {
        Self {
            escalation_interval: Duration::from_secs(DEFAULT_ESCALATION_INTERVAL_SECS),
            sla_monitor_interval: Duration::from_secs(DEFAULT_SLA_MONITOR_INTERVAL_SECS),
            notification_timeout: Duration::from_millis(DEFAULT_NOTIFICATION_TIMEOUT_MS),
            default_assignee: None,
            default_calendar: CalendarKind::AlwaysOpen,
            long_pending_minutes: DEFAULT_LONG_PENDING_MINUTES,
            unassigned_minutes: DEFAULT_UNASSIGNED_MINUTES,
            supervisors: Vec::new(),
        }
    }
}

impl SlaEngineConfig {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `ITSM_ESCALATION_INTERVAL_SECS`: escalation sweep period (default: 300)
    /// - `ITSM_SLA_MONITOR_INTERVAL_SECS`: monitoring period (default: 60)
    /// - `ITSM_NOTIFICATION_TIMEOUT_MS`: notification bound (default: 5000)
    /// - `ITSM_DEFAULT_ASSIGNEE`: fallback assignee UUID
    /// - `ITSM_DEFAULT_CALENDAR`: `always_open` (default) or `business_hours`
    /// - `ITSM_LONG_PENDING_MINUTES`: long-pending reminder age (default: 1440)
    /// - `ITSM_UNASSIGNED_MINUTES`: unassigned reminder age (default: 120)
    /// - `ITSM_SUPERVISORS`: comma-separated reminder recipient UUIDs
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let escalation_interval = match lookup("ITSM_ESCALATION_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_u64("ITSM_ESCALATION_INTERVAL_SECS", &v)?.max(1)),
            None => defaults.escalation_interval,
        };

        let sla_monitor_interval = match lookup("ITSM_SLA_MONITOR_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_u64("ITSM_SLA_MONITOR_INTERVAL_SECS", &v)?.max(1)),
            None => defaults.sla_monitor_interval,
        };

        let notification_timeout = match lookup("ITSM_NOTIFICATION_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_u64("ITSM_NOTIFICATION_TIMEOUT_MS", &v)?),
            None => defaults.notification_timeout,
        };

        let default_assignee = match lookup("ITSM_DEFAULT_ASSIGNEE") {
            Some(v) if !v.trim().is_empty() => {
                Some(v.trim().parse::<UserId>().map_err(|e| SlaError::Config {
                    var: "ITSM_DEFAULT_ASSIGNEE".to_string(),
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };

        let default_calendar = match lookup("ITSM_DEFAULT_CALENDAR") {
            Some(v) => CalendarKind::from_str(&v)?,
            None => defaults.default_calendar,
        };

        let long_pending_minutes = match lookup("ITSM_LONG_PENDING_MINUTES") {
            Some(v) => parse_minutes("ITSM_LONG_PENDING_MINUTES", &v)?,
            None => defaults.long_pending_minutes,
        };

        let unassigned_minutes = match lookup("ITSM_UNASSIGNED_MINUTES") {
            Some(v) => parse_minutes("ITSM_UNASSIGNED_MINUTES", &v)?,
            None => defaults.unassigned_minutes,
        };

        let supervisors = match lookup("ITSM_SUPERVISORS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<UserId>().map_err(|e| SlaError::Config {
                        var: "ITSM_SUPERVISORS".to_string(),
                        reason: format!("{id:?}: {e}"),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.supervisors,
        };

        Ok(Self {
            escalation_interval,
            sla_monitor_interval,
            notification_timeout,
            default_assignee,
            default_calendar,
            long_pending_minutes,
            unassigned_minutes,
            supervisors,
        })
    }

    /// Set the fallback assignee.
    #[must_use]
    pub fn with_default_assignee(mut self, assignee: UserId) -> Self {
        self.default_assignee = Some(assignee);
        self
    }

    /// Set the notification bound.
    #[must_use]
    pub fn with_notification_timeout(mut self, timeout: Duration) -> Self {
        self.notification_timeout = timeout;
        self
    }

    /// Set the reminder ages in minutes.
    #[must_use]
    pub fn with_reminder_thresholds(mut self, long_pending: u32, unassigned: u32) -> Self {
        self.long_pending_minutes = long_pending;
        self.unassigned_minutes = unassigned;
        self
    }

    /// Set the reminder supervisors.
    #[must_use]
    pub fn with_supervisors(mut self, supervisors: Vec<UserId>) -> Self {
        self.supervisors = supervisors;
        self
    }
}

fn parse_u64(var: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| SlaError::Config {
        var: var.to_string(),
        reason: format!("{value:?} is not a non-negative integer: {e}"),
    })
}

fn parse_minutes(var: &str, value: &str) -> Result<u32> {
    let minutes = parse_u64(var, value)?;
    u32::try_from(minutes).map_err(|_| SlaError::Config {
        var: var.to_string(),
        reason: format!("{minutes} minutes is out of range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = SlaEngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.escalation_interval, Duration::from_secs(300));
        assert_eq!(config.sla_monitor_interval, Duration::from_secs(60));
        assert_eq!(config.notification_timeout, Duration::from_millis(5000));
        assert!(config.default_assignee.is_none());
        assert_eq!(config.default_calendar, CalendarKind::AlwaysOpen);
        assert_eq!(config.long_pending_minutes, 1440);
        assert_eq!(config.unassigned_minutes, 120);
        assert!(config.supervisors.is_empty());
    }

    #[test]
    fn test_reminder_settings_are_parsed() {
        let first = UserId::new();
        let second = UserId::new();
        let supervisors = format!("{first}, {second},");
        let config = SlaEngineConfig::from_lookup(lookup(&[
            ("ITSM_LONG_PENDING_MINUTES", "480"),
            ("ITSM_UNASSIGNED_MINUTES", "30"),
            ("ITSM_SUPERVISORS", &supervisors),
        ]))
        .unwrap();
        assert_eq!(config.long_pending_minutes, 480);
        assert_eq!(config.unassigned_minutes, 30);
        assert_eq!(config.supervisors, vec![first, second]);

        let err = SlaEngineConfig::from_lookup(lookup(&[("ITSM_SUPERVISORS", "root")]))
            .unwrap_err();
        assert!(matches!(err, SlaError::Config { ref var, .. } if var == "ITSM_SUPERVISORS"));
    }

    #[test]
    fn test_values_are_parsed() {
        let assignee = UserId::new();
        let config = SlaEngineConfig::from_lookup(lookup(&[
            ("ITSM_ESCALATION_INTERVAL_SECS", "120"),
            ("ITSM_NOTIFICATION_TIMEOUT_MS", "250"),
            ("ITSM_DEFAULT_ASSIGNEE", &assignee.to_string()),
            ("ITSM_DEFAULT_CALENDAR", "business_hours"),
        ]))
        .unwrap();

        assert_eq!(config.escalation_interval, Duration::from_secs(120));
        assert_eq!(config.notification_timeout, Duration::from_millis(250));
        assert_eq!(config.default_assignee, Some(assignee));
        assert_eq!(config.default_calendar, CalendarKind::BusinessHours);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config =
            SlaEngineConfig::from_lookup(lookup(&[("ITSM_SLA_MONITOR_INTERVAL_SECS", "0")]))
                .unwrap();
        assert_eq!(config.sla_monitor_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = SlaEngineConfig::from_lookup(lookup(&[("ITSM_ESCALATION_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(
            matches!(err, SlaError::Config { ref var, .. } if var == "ITSM_ESCALATION_INTERVAL_SECS")
        );

        let err = SlaEngineConfig::from_lookup(lookup(&[("ITSM_DEFAULT_ASSIGNEE", "bob")]))
            .unwrap_err();
        assert!(matches!(err, SlaError::Config { ref var, .. } if var == "ITSM_DEFAULT_ASSIGNEE"));

        assert!("lunar".parse::<CalendarKind>().is_err());
    }
}
