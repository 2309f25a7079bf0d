//! SLA-governed ticket lifecycle engine.
//!
//! This crate tracks ITSM tickets through their status workflow and enforces
//! service level agreements over them.
//!
//! # Features
//!
//! - Guarded status transitions with an audit trail
//! - SLA definition catalog keyed by service type, priority and impact
//! - Response and resolution deadlines over business-hour calendars
//! - Threshold alerts with multi-level escalation and deduplication
//! - Violation detection, acknowledgement and compliance summaries
//! - Rule-driven auto-assignment (round robin, least busy, skill based)
//! - Time-limit driven auto-escalation and manual escalation
//! - One-time reminders for long-pending and unassigned tickets
//!
//! # Services
//!
//! The [`services`] module provides:
//! - [`services::SlaCatalog`] - Manage SLA definitions
//! - [`services::SlaDeadlineCalculator`] - Deadline and remaining-time arithmetic
//! - [`services::SlaAlertEngine`] - Threshold alerts and alert escalation
//! - [`services::SlaViolationDetector`] - Record and manage violations
//! - [`services::WorkflowAutomationRouter`] - Auto-assignment
//! - [`services::EscalationService`] - Sweep and manual escalation
//! - [`services::ReminderService`] - Long-pending and unassigned reminders
//!
//! [`SlaEngine`] wires them together over one set of stores. The [`jobs`]
//! module runs the periodic escalation sweep and SLA monitoring per tenant.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use itsm_sla::{
//!     EngineStores, SlaEngine, SlaEngineConfig, SystemClock, TracingNotificationSink,
//! };
//!
//! let engine = SlaEngine::new(
//!     EngineStores::in_memory(),
//!     Arc::new(TracingNotificationSink),
//!     Arc::new(SystemClock),
//!     SlaEngineConfig::default(),
//! );
//! assert!(engine.tracker().table().is_allowed(
//!     itsm_sla::TicketStatus::Open,
//!     itsm_sla::TicketStatus::InProgress,
//! ));
//! ```

pub mod audit;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod services;
pub mod ticket;
pub mod types;

pub use audit::{InMemoryTransitionAuditStore, StatusTransition, TransitionAuditStore};
pub use calendar::{AlwaysOpenCalendar, BusinessCalendar, BusinessHours, WeeklyBusinessCalendar};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CalendarKind, SlaEngineConfig};
pub use engine::{EngineStores, SlaEngine, TicketMonitorReport};
pub use error::{Result, SlaError};
pub use jobs::{
    EscalationJob, EscalationJobError, EscalationPollStats, SlaMonitoringJob, SlaMonitoringJobError,
    SlaMonitoringStats, SlaScheduler,
};
pub use lifecycle::{StatusTransitionTable, TicketLifecycleTracker, TransitionOutcome};
pub use services::*;
pub use ticket::{InMemoryTicketStore, Ticket, TicketStore};
pub use types::*;
