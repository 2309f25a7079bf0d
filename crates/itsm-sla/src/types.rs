//! Type definitions for the ticket lifecycle domain.
//!
//! Includes newtype wrappers for IDs and enums for domain values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SlaError;

// ============================================================================
// ID Types (Newtype Pattern)
// ============================================================================

macro_rules! define_sla_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID.
            #[must_use]
            pub fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_sla_id!(
    /// Unique identifier for an SLA definition.
    SlaDefinitionId
);
define_sla_id!(
    /// Unique identifier for an SLA alert rule.
    AlertRuleId
);
define_sla_id!(
    /// Unique identifier for an SLA alert history row.
    AlertHistoryId
);
define_sla_id!(
    /// Unique identifier for a recorded SLA violation.
    ViolationId
);
define_sla_id!(
    /// Unique identifier for an automatic escalation rule.
    EscalationRuleId
);
define_sla_id!(
    /// Unique identifier for an automatic assignment rule.
    AssignmentRuleId
);
define_sla_id!(
    /// Unique identifier for a status transition audit record.
    TransitionId
);
define_sla_id!(
    /// Unique identifier for an escalation audit event.
    EscalationEventId
);
define_sla_id!(
    /// Unique identifier for a ticket reminder row.
    ReminderId
);

// ============================================================================
// Enums
// ============================================================================

/// Ticket workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "itsm_ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Newly raised, nobody has started on it.
    Open,
    /// An agent is actively working the ticket.
    InProgress,
    /// Waiting on the requester or a third party.
    Pending,
    /// A fix has been delivered.
    Resolved,
    /// Requester confirmed, nothing further to do.
    Closed,
    /// Withdrawn before resolution.
    Cancelled,
    /// Came back after resolution or closure.
    Reopened,
}

impl TicketStatus {
    /// Every status, in workflow order.
    pub const ALL: [TicketStatus; 7] = [
        Self::Open,
        Self::InProgress,
        Self::Pending,
        Self::Resolved,
        Self::Closed,
        Self::Cancelled,
        Self::Reopened,
    ];

    /// Stable label used in storage and APIs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Reopened => "reopened",
        }
    }

    /// Whether work on the ticket still counts against its SLA.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Open | Self::InProgress | Self::Pending | Self::Reopened
        )
    }

    /// Whether the status means an agent has engaged with the ticket.
    #[must_use]
    pub fn counts_as_response(&self) -> bool {
        matches!(self, Self::InProgress | Self::Pending | Self::Resolved)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = SlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SlaError::UnknownState(s.to_string()))
    }
}

/// Ticket priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "itsm_ticket_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    /// Stable label used in storage and rule conditions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = SlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(SlaError::Validation(format!("unknown priority '{other}'"))),
        }
    }
}

/// Business impact of a ticket, part of the SLA lookup key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "itsm_ticket_impact", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Which SLA deadline a computation or alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineKind {
    /// Time until the first agent response.
    Response,
    /// Time until the ticket is resolved.
    Resolution,
}

impl DeadlineKind {
    /// Both kinds, response first.
    pub const ALL: [DeadlineKind; 2] = [Self::Response, Self::Resolution];

    /// Violation type raised when this deadline is exceeded.
    #[must_use]
    pub fn violation_type(&self) -> ViolationType {
        match self {
            Self::Response => ViolationType::ResponseTime,
            Self::Resolution => ViolationType::ResolutionTime,
        }
    }
}

impl fmt::Display for DeadlineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response => write!(f, "response"),
            Self::Resolution => write!(f, "resolution"),
        }
    }
}

/// Category of SLA breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "itsm_sla_violation_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    ResponseTime,
    ResolutionTime,
}

impl ViolationType {
    /// Severity assigned to newly detected violations of this type.
    #[must_use]
    pub fn default_severity(&self) -> ViolationSeverity {
        match self {
            Self::ResponseTime => ViolationSeverity::High,
            Self::ResolutionTime => ViolationSeverity::Critical,
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResponseTime => write!(f, "response_time"),
            Self::ResolutionTime => write!(f, "resolution_time"),
        }
    }
}

/// Handling status of a recorded violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "itsm_sla_violation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    /// Recorded, nobody has looked at it yet.
    #[default]
    Pending,
    /// Someone has taken ownership of the breach.
    Acknowledged,
    /// Breach handled; kept for reporting.
    Resolved,
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// Severity recorded on a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Label of an SLA alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    #[default]
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Why a work item was escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// An automatic rule's time limit elapsed.
    Timeout,
    /// An operator forced the escalation.
    ManualEscalation,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ManualEscalation => write!(f, "manual_escalation"),
        }
    }
}

/// Condition a one-time ticket reminder reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Still active long after creation.
    LongPending,
    /// Still without an assignee after creation.
    Unassigned,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [Self::LongPending, Self::Unassigned];
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LongPending => write!(f, "long_pending"),
            Self::Unassigned => write!(f, "unassigned"),
        }
    }
}
