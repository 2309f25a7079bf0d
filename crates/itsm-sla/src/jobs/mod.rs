//! Background jobs.
//!
//! - [`EscalationJob`] - automatic escalation sweep and ticket reminders
//!   (default: every 5 minutes)
//! - [`SlaMonitoringJob`] - violation, alert and alert-escalation checks
//!   (default: every minute)
//! - [`SlaScheduler`] - per-tenant loops driving both, with graceful shutdown

pub mod escalation_job;
pub mod scheduler;
pub mod sla_monitoring_job;

pub use escalation_job::{EscalationJob, EscalationJobError, EscalationPollStats};
pub use scheduler::SlaScheduler;
pub use sla_monitoring_job::{SlaMonitoringJob, SlaMonitoringJobError, SlaMonitoringStats};
