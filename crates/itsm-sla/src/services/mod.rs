//! Service layer for the SLA lifecycle engine.
//!
//! This module provides the SLA catalog, deadline arithmetic, violation
//! detection, alerting, automation routing, escalation and ticket reminders.

pub mod alert;
pub mod automation;
pub mod deadline;
pub mod escalation;
pub mod notification;
pub mod reminder;
pub mod router;
pub mod sla_definition;
pub mod violation;

// Re-export commonly used types
pub use alert::{
    AlertCheckOutcome, AlertHistoryFilter, AlertHistoryStore, AlertRuleStore, EscalationLevel,
    InMemoryAlertHistoryStore, InMemoryAlertRuleStore, SlaAlertEngine, SlaAlertHistory,
    SlaAlertRule,
};
pub use automation::{
    Assignee, AssignmentGroup, AssignmentStrategyKind, AutoAssignmentRule, AutoEscalationRule,
    AutomationRuleStore, Condition, EscalationTarget, InMemoryAutomationRuleStore,
};
pub use deadline::{SlaDeadlineCalculator, SlaDeadlines};
pub use escalation::{
    EscalationCandidate, EscalationEvent, EscalationEventStore, EscalationService,
    EscalationSweepStats, InMemoryEscalationEventStore,
};
pub use notification::{
    NotificationMessage, NotificationSink, Notifier, RecordedNotification,
    RecordingNotificationSink, TracingNotificationSink,
};
pub use reminder::{
    InMemoryReminderStore, ReminderPolicy, ReminderService, ReminderStats, ReminderStore,
    TicketReminder,
};
pub use router::{
    AssignmentStrategy, LeastBusyStrategy, RoundRobinStrategy, SkillBasedStrategy,
    WorkflowAutomationRouter,
};
pub use sla_definition::{InMemorySlaDefinitionStore, SlaCatalog, SlaDefinition, SlaDefinitionStore};
pub use violation::{
    ComplianceSummary, InMemoryViolationStore, SlaViolation, SlaViolationDetector, ViolationStore,
};
