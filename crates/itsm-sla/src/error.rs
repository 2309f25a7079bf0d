//! Error types for the SLA lifecycle engine.

use itsm_core::{ItsmError, TicketId};
use thiserror::Error;

use crate::types::{
    AlertRuleId, EscalationRuleId, SlaDefinitionId, TicketStatus, ViolationId,
};

/// Errors raised by the lifecycle engine and its stores.
#[derive(Debug, Clone, Error)]
pub enum SlaError {
    /// The requested status change is not an edge of the transition table.
    #[error("Illegal transition: ticket status {from} cannot move to {to}")]
    IllegalTransition {
        /// Status the ticket is currently in.
        from: TicketStatus,
        /// Status the caller asked for.
        to: TicketStatus,
    },

    /// A status label that is not part of the ticket workflow.
    #[error("Unknown ticket status: {0}")]
    UnknownState(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("SLA definition not found: {0}")]
    SlaDefinitionNotFound(SlaDefinitionId),

    #[error("SLA alert rule not found: {0}")]
    AlertRuleNotFound(AlertRuleId),

    #[error("SLA violation not found: {0}")]
    ViolationNotFound(ViolationId),

    #[error("Escalation rule not found: {0}")]
    EscalationRuleNotFound(EscalationRuleId),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A store could not complete a read or write.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The notification sink rejected a message.
    #[error("Notification failure: {0}")]
    Notification(String),

    /// The notification sink did not answer within the configured bound.
    #[error("Notification timed out after {0} ms")]
    NotificationTimeout(u64),

    /// Entity belongs to a different tenant than the caller.
    #[error("Tenant mismatch")]
    TenantMismatch,

    /// Configuration value missing or malformed.
    #[error("Invalid configuration {var}: {reason}")]
    Config {
        /// Environment variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for lifecycle engine operations.
pub type Result<T> = std::result::Result<T, SlaError>;

impl SlaError {
    /// Whether the error describes a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TicketNotFound(_)
                | Self::SlaDefinitionNotFound(_)
                | Self::AlertRuleNotFound(_)
                | Self::ViolationNotFound(_)
                | Self::EscalationRuleNotFound(_)
        )
    }
}

impl From<SlaError> for ItsmError {
    fn from(err: SlaError) -> Self {
        match err {
            SlaError::IllegalTransition { .. } => ItsmError::Conflict {
                message: err.to_string(),
            },
            SlaError::UnknownState(state) => ItsmError::ValidationError {
                field: "status".to_string(),
                message: format!("unknown status '{state}'"),
            },
            SlaError::TicketNotFound(id) => ItsmError::NotFound {
                resource: "Ticket".to_string(),
                id: Some(id.to_string()),
            },
            SlaError::SlaDefinitionNotFound(id) => ItsmError::NotFound {
                resource: "SLA definition".to_string(),
                id: Some(id.to_string()),
            },
            SlaError::AlertRuleNotFound(id) => ItsmError::NotFound {
                resource: "SLA alert rule".to_string(),
                id: Some(id.to_string()),
            },
            SlaError::ViolationNotFound(id) => ItsmError::NotFound {
                resource: "SLA violation".to_string(),
                id: Some(id.to_string()),
            },
            SlaError::EscalationRuleNotFound(id) => ItsmError::NotFound {
                resource: "Escalation rule".to_string(),
                id: Some(id.to_string()),
            },
            SlaError::Validation(message) => ItsmError::ValidationError {
                field: "input".to_string(),
                message,
            },
            SlaError::Config { var, reason } => ItsmError::ValidationError {
                field: var,
                message: reason,
            },
            SlaError::TenantMismatch
            | SlaError::Persistence(_)
            | SlaError::Notification(_)
            | SlaError::NotificationTimeout(_) => ItsmError::Internal {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_names_both_states() {
        let err = SlaError::IllegalTransition {
            from: TicketStatus::Open,
            to: TicketStatus::Closed,
        };
        let message = err.to_string();
        assert!(message.contains("open"));
        assert!(message.contains("closed"));
    }

    #[test]
    fn test_illegal_transition_maps_to_conflict() {
        let err = SlaError::IllegalTransition {
            from: TicketStatus::Resolved,
            to: TicketStatus::Pending,
        };
        let outward: ItsmError = err.into();
        assert_eq!(outward.status_code(), 409);
        assert!(outward.to_string().contains("resolved"));
        assert!(outward.to_string().contains("pending"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let id = TicketId::new();
        let err = SlaError::TicketNotFound(id);
        assert!(err.is_not_found());

        let outward: ItsmError = err.into();
        assert_eq!(outward.status_code(), 404);
        assert!(outward.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_persistence_maps_to_internal() {
        let outward: ItsmError = SlaError::Persistence("disk full".to_string()).into();
        assert_eq!(outward.status_code(), 500);
        assert!(!SlaError::Persistence(String::new()).is_not_found());
    }
}
