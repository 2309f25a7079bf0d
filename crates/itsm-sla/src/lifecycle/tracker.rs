//! Ticket lifecycle tracker.
//!
//! Owns status and priority changes of a ticket and appends the transition
//! audit trail. The status write is authoritative; the audit append is
//! best-effort and its outcome is reported in [`TransitionOutcome`].

use std::sync::Arc;

use itsm_core::{TenantId, TicketId, UserId};
use tracing::{info, instrument, warn};

use crate::audit::{StatusTransition, TransitionAuditStore};
use crate::clock::Clock;
use crate::error::Result;
use crate::lifecycle::table::StatusTransitionTable;
use crate::ticket::{Ticket, TicketStore};
use crate::types::{TicketPriority, TicketStatus, TransitionId};

/// Result of an applied status transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Ticket as persisted after the change.
    pub ticket: Ticket,
    /// The audit record describing the change.
    pub transition: StatusTransition,
    /// Whether the audit record reached the audit store.
    pub audit_persisted: bool,
}

/// Applies validated status changes to tickets.
pub struct TicketLifecycleTracker {
    tickets: Arc<dyn TicketStore>,
    audit: Arc<dyn TransitionAuditStore>,
    table: StatusTransitionTable,
    clock: Arc<dyn Clock>,
}

impl TicketLifecycleTracker {
    /// Create a tracker using the canonical transition table.
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        audit: Arc<dyn TransitionAuditStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            audit,
            table: StatusTransitionTable::canonical(),
            clock,
        }
    }

    /// Replace the transition table.
    #[must_use]
    pub fn with_table(mut self, table: StatusTransitionTable) -> Self {
        self.table = table;
        self
    }

    #[must_use]
    pub fn table(&self) -> &StatusTransitionTable {
        &self.table
    }

    /// Move `ticket` to `to`.
    ///
    /// Nothing is written when the transition is illegal. Lifecycle
    /// timestamps are set on first entry only and never overwritten.
    #[instrument(skip(self, ticket, reason), fields(ticket_id = %ticket.id, from = %ticket.status))]
    pub async fn transition(
        &self,
        mut ticket: Ticket,
        to: TicketStatus,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<TransitionOutcome> {
        let from = ticket.status;
        self.table.validate(from, to)?;

        let now = self.clock.now();
        ticket.status = to;
        ticket.updated_at = now;
        if to.counts_as_response() && ticket.first_response_at.is_none() {
            ticket.first_response_at = Some(now);
        }
        if to == TicketStatus::Resolved && ticket.resolved_at.is_none() {
            ticket.resolved_at = Some(now);
        }
        if to == TicketStatus::Closed && ticket.closed_at.is_none() {
            ticket.closed_at = Some(now);
        }

        let ticket = self.tickets.update(ticket).await?;

        let transition = StatusTransition {
            id: TransitionId::new(),
            tenant_id: ticket.tenant_id,
            ticket_id: ticket.id,
            from_status: from,
            to_status: to,
            user_id,
            reason,
            timestamp: now,
        };
        let audit_persisted = match self.audit.append(transition.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    ticket_id = %ticket.id,
                    error = %e,
                    "Failed to record status transition audit entry"
                );
                false
            }
        };

        info!(
            ticket_id = %ticket.id,
            from = %from,
            to = %to,
            user_id = %user_id,
            "Ticket status changed"
        );

        Ok(TransitionOutcome {
            ticket,
            transition,
            audit_persisted,
        })
    }

    /// Change a ticket's priority.
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    pub async fn change_priority(
        &self,
        mut ticket: Ticket,
        priority: TicketPriority,
        user_id: UserId,
    ) -> Result<Ticket> {
        let previous = ticket.priority;
        if previous == priority {
            return Ok(ticket);
        }
        ticket.priority = priority;
        ticket.updated_at = self.clock.now();
        let ticket = self.tickets.update(ticket).await?;
        info!(
            ticket_id = %ticket.id,
            from = %previous,
            to = %priority,
            user_id = %user_id,
            "Ticket priority changed"
        );
        Ok(ticket)
    }

    /// Transition history of a ticket, oldest first.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<StatusTransition>> {
        self.audit.list_for_ticket(tenant_id, ticket_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use crate::audit::InMemoryTransitionAuditStore;
    use crate::clock::ManualClock;
    use crate::error::SlaError;
    use crate::ticket::InMemoryTicketStore;
    use crate::types::Impact;

    struct BrokenAudit;

    #[async_trait::async_trait]
    impl TransitionAuditStore for BrokenAudit {
        async fn append(&self, _record: StatusTransition) -> Result<()> {
            Err(SlaError::Persistence("audit table unavailable".to_string()))
        }

        async fn list_for_ticket(&self, _: TenantId, _: TicketId) -> Result<Vec<StatusTransition>> {
            Ok(Vec::new())
        }
    }

    async fn setup(
        audit: Arc<dyn TransitionAuditStore>,
    ) -> (TicketLifecycleTracker, Arc<InMemoryTicketStore>, Arc<ManualClock>, Ticket) {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let tickets = Arc::new(InMemoryTicketStore::new());
        let ticket = tickets
            .insert(Ticket::new(
                TenantId::new(),
                "Badge broken",
                "facilities",
                TicketPriority::Low,
                Impact::Low,
                t0,
            ))
            .await
            .unwrap();
        let tracker = TicketLifecycleTracker::new(tickets.clone(), audit, clock.clone());
        (tracker, tickets, clock, ticket)
    }

    #[tokio::test]
    async fn test_illegal_transition_writes_nothing() {
        let audit = Arc::new(InMemoryTransitionAuditStore::new());
        let (tracker, tickets, _, ticket) = setup(audit.clone()).await;

        let err = tracker
            .transition(ticket.clone(), TicketStatus::Closed, UserId::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SlaError::IllegalTransition {
                from: TicketStatus::Open,
                to: TicketStatus::Closed
            }
        ));

        let stored = tickets.get(ticket.tenant_id, ticket.id).await.unwrap().unwrap();
        assert_eq!(stored, ticket);
        assert_eq!(audit.count().await, 0);
    }

    #[tokio::test]
    async fn test_lifecycle_timestamps_set_once() {
        let audit = Arc::new(InMemoryTransitionAuditStore::new());
        let (tracker, _, clock, ticket) = setup(audit.clone()).await;
        let agent = UserId::new();

        clock.advance(Duration::minutes(5));
        let outcome = tracker
            .transition(ticket, TicketStatus::InProgress, agent, None)
            .await
            .unwrap();
        let first_response = outcome.ticket.first_response_at.unwrap();

        clock.advance(Duration::minutes(5));
        let outcome = tracker
            .transition(outcome.ticket, TicketStatus::Resolved, agent, None)
            .await
            .unwrap();
        let resolved_at = outcome.ticket.resolved_at.unwrap();
        assert_eq!(outcome.ticket.first_response_at, Some(first_response));

        clock.advance(Duration::minutes(5));
        let outcome = tracker
            .transition(outcome.ticket, TicketStatus::Reopened, agent, None)
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        let outcome = tracker
            .transition(outcome.ticket, TicketStatus::InProgress, agent, None)
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        let outcome = tracker
            .transition(outcome.ticket, TicketStatus::Resolved, agent, None)
            .await
            .unwrap();

        assert_eq!(outcome.ticket.first_response_at, Some(first_response));
        assert_eq!(outcome.ticket.resolved_at, Some(resolved_at));
        assert_eq!(audit.count().await, 5);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_roll_back() {
        let (tracker, tickets, _, ticket) = setup(Arc::new(BrokenAudit)).await;

        let outcome = tracker
            .transition(
                ticket.clone(),
                TicketStatus::Cancelled,
                UserId::new(),
                Some("duplicate".to_string()),
            )
            .await
            .unwrap();

        assert!(!outcome.audit_persisted);
        assert_eq!(outcome.transition.reason.as_deref(), Some("duplicate"));
        let stored = tickets.get(ticket.tenant_id, ticket.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Cancelled);
        assert!(stored.first_response_at.is_none());
    }

    #[tokio::test]
    async fn test_primary_write_failure_aborts() {
        let audit = Arc::new(InMemoryTransitionAuditStore::new());
        let (tracker, _, _, mut ticket) = setup(audit.clone()).await;
        ticket.id = TicketId::new();

        let err = tracker
            .transition(ticket, TicketStatus::InProgress, UserId::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(audit.count().await, 0);
    }

    #[tokio::test]
    async fn test_change_priority() {
        let audit = Arc::new(InMemoryTransitionAuditStore::new());
        let (tracker, tickets, _, ticket) = setup(audit).await;

        let updated = tracker
            .change_priority(ticket, TicketPriority::Critical, UserId::new())
            .await
            .unwrap();
        assert_eq!(updated.priority, TicketPriority::Critical);
        let stored = tickets.get(updated.tenant_id, updated.id).await.unwrap().unwrap();
        assert_eq!(stored.priority, TicketPriority::Critical);
    }
}
