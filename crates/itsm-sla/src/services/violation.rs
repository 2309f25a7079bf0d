//! SLA violation detection and handling.
//!
//! A violation is recorded at most once per (ticket, violation type). It never
//! clears itself; operators acknowledge and resolve it explicitly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::error::{Result, SlaError};
use crate::services::deadline::SlaDeadlineCalculator;
use crate::services::sla_definition::SlaDefinition;
use crate::ticket::{Ticket, TicketStore};
use crate::types::{
    DeadlineKind, SlaDefinitionId, TicketStatus, ViolationId, ViolationSeverity, ViolationStatus,
    ViolationType,
};

// ============================================================================
// Domain Types
// ============================================================================

/// A recorded SLA breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaViolation {
    pub id: ViolationId,
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub sla_definition_id: SlaDefinitionId,
    pub violation_type: ViolationType,
    pub severity: ViolationSeverity,
    /// Budget in business minutes.
    pub expected_time_minutes: i64,
    /// Business minutes elapsed when detected.
    pub actual_time_minutes: i64,
    /// Always `actual - expected`, and always positive.
    pub overdue_minutes: i64,
    pub status: ViolationStatus,
    pub violation_occurred_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub acknowledged_by: Option<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Per-tenant SLA compliance figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Tickets linked to an SLA definition.
    pub total_tickets: usize,
    /// Governed tickets with at least one violation.
    pub violated_tickets: usize,
    /// `100 * (total - violated) / total`, or 100 with no tickets.
    pub compliance_rate: f64,
    pub response_violations: usize,
    pub resolution_violations: usize,
    /// Violations not yet resolved.
    pub open_violations: usize,
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for violation storage backends.
#[async_trait::async_trait]
pub trait ViolationStore: Send + Sync {
    /// Insert `violation` unless one of the same type already exists for the
    /// ticket. Check and insert are one atomic step.
    async fn create_if_absent(&self, violation: SlaViolation) -> Result<Option<SlaViolation>>;

    async fn get(&self, tenant_id: TenantId, id: ViolationId) -> Result<Option<SlaViolation>>;

    /// Replace an existing violation.
    async fn update(&self, violation: SlaViolation) -> Result<SlaViolation>;

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaViolation>>;

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<SlaViolation>>;
}

// ============================================================================
// In-Memory Store (for testing)
// ============================================================================

/// In-memory violation store for testing.
#[derive(Debug, Default)]
pub struct InMemoryViolationStore {
    violations: Arc<RwLock<HashMap<ViolationId, SlaViolation>>>,
}

impl InMemoryViolationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.violations.read().await.len()
    }
}

#[async_trait::async_trait]
impl ViolationStore for InMemoryViolationStore {
    async fn create_if_absent(&self, violation: SlaViolation) -> Result<Option<SlaViolation>> {
        let mut violations = self.violations.write().await;
        let exists = violations.values().any(|v| {
            v.tenant_id == violation.tenant_id
                && v.ticket_id == violation.ticket_id
                && v.violation_type == violation.violation_type
        });
        if exists {
            return Ok(None);
        }
        violations.insert(violation.id, violation.clone());
        Ok(Some(violation))
    }

    async fn get(&self, tenant_id: TenantId, id: ViolationId) -> Result<Option<SlaViolation>> {
        let violations = self.violations.read().await;
        Ok(violations
            .get(&id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned())
    }

    async fn update(&self, violation: SlaViolation) -> Result<SlaViolation> {
        let mut violations = self.violations.write().await;
        match violations.get_mut(&violation.id) {
            Some(existing) if existing.tenant_id == violation.tenant_id => {
                *existing = violation.clone();
                Ok(violation)
            }
            _ => Err(SlaError::ViolationNotFound(violation.id)),
        }
    }

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaViolation>> {
        let violations = self.violations.read().await;
        let mut list: Vec<_> = violations
            .values()
            .filter(|v| v.tenant_id == tenant_id && v.ticket_id == ticket_id)
            .cloned()
            .collect();
        list.sort_by_key(|v| v.detected_at);
        Ok(list)
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<SlaViolation>> {
        let violations = self.violations.read().await;
        let mut list: Vec<_> = violations
            .values()
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by_key(|v| v.detected_at);
        Ok(list)
    }
}

// ============================================================================
// Detector Service
// ============================================================================

/// Compares elapsed business time against SLA budgets.
pub struct SlaViolationDetector {
    store: Arc<dyn ViolationStore>,
    tickets: Arc<dyn TicketStore>,
    calculator: SlaDeadlineCalculator,
    clock: Arc<dyn Clock>,
}

impl SlaViolationDetector {
    pub fn new(
        store: Arc<dyn ViolationStore>,
        tickets: Arc<dyn TicketStore>,
        calculator: SlaDeadlineCalculator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            tickets,
            calculator,
            clock,
        }
    }

    /// Record any new breaches of `ticket` against `definition`.
    ///
    /// Returns only the violations created by this call; repeated calls on a
    /// ticket that stays in breach return an empty list.
    #[instrument(skip(self, ticket, definition), fields(ticket_id = %ticket.id))]
    pub async fn check_violations(
        &self,
        ticket: &Ticket,
        definition: &SlaDefinition,
    ) -> Result<Vec<SlaViolation>> {
        if ticket.status == TicketStatus::Cancelled {
            debug!("Cancelled ticket, skipping violation check");
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let calendar = self.calculator.calendar_for(definition);
        let elapsed =
            SlaDeadlineCalculator::elapsed_business_minutes(ticket.created_at, now, calendar.as_ref());

        let mut created = Vec::new();
        for kind in DeadlineKind::ALL {
            if ticket.deadline_met(kind) {
                continue;
            }
            let expected = i64::from(match kind {
                DeadlineKind::Response => definition.response_time_minutes,
                DeadlineKind::Resolution => definition.resolution_time_minutes,
            });
            if elapsed <= expected {
                continue;
            }

            let violation_type = kind.violation_type();
            let candidate = SlaViolation {
                id: ViolationId::new(),
                tenant_id: ticket.tenant_id,
                ticket_id: ticket.id,
                sla_definition_id: definition.id,
                violation_type,
                severity: violation_type.default_severity(),
                expected_time_minutes: expected,
                actual_time_minutes: elapsed,
                overdue_minutes: elapsed - expected,
                status: ViolationStatus::Pending,
                violation_occurred_at: ticket.deadline(kind).unwrap_or(now),
                detected_at: now,
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_at: None,
                notes: None,
            };

            if let Some(violation) = self.store.create_if_absent(candidate).await? {
                info!(
                    ticket_id = %ticket.id,
                    violation_type = %violation.violation_type,
                    overdue_minutes = violation.overdue_minutes,
                    "SLA violation recorded"
                );
                created.push(violation);
            }
        }

        Ok(created)
    }

    pub async fn get(&self, tenant_id: TenantId, id: ViolationId) -> Result<SlaViolation> {
        self.store
            .get(tenant_id, id)
            .await?
            .ok_or(SlaError::ViolationNotFound(id))
    }

    pub async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaViolation>> {
        self.store.list_for_ticket(tenant_id, ticket_id).await
    }

    /// Move a pending violation to acknowledged.
    #[instrument(skip(self))]
    pub async fn acknowledge(
        &self,
        tenant_id: TenantId,
        id: ViolationId,
        user_id: UserId,
    ) -> Result<SlaViolation> {
        let mut violation = self.get(tenant_id, id).await?;
        if violation.status != ViolationStatus::Pending {
            return Err(SlaError::Validation(format!(
                "violation {id} is {} and cannot be acknowledged",
                violation.status
            )));
        }
        violation.status = ViolationStatus::Acknowledged;
        violation.acknowledged_by = Some(user_id);
        violation.acknowledged_at = Some(self.clock.now());
        let saved = self.store.update(violation).await?;
        info!(violation_id = %id, "SLA violation acknowledged");
        Ok(saved)
    }

    /// Resolve a pending or acknowledged violation with optional notes.
    #[instrument(skip(self, notes))]
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        id: ViolationId,
        notes: Option<String>,
    ) -> Result<SlaViolation> {
        let mut violation = self.get(tenant_id, id).await?;
        if violation.status == ViolationStatus::Resolved {
            return Err(SlaError::Validation(format!(
                "violation {id} is already resolved"
            )));
        }
        violation.status = ViolationStatus::Resolved;
        violation.resolved_at = Some(self.clock.now());
        if notes.is_some() {
            violation.notes = notes;
        }
        let saved = self.store.update(violation).await?;
        info!(violation_id = %id, "SLA violation resolved");
        Ok(saved)
    }

    /// Compliance figures over every SLA-governed ticket of a tenant.
    #[instrument(skip(self))]
    pub async fn compliance_summary(&self, tenant_id: TenantId) -> Result<ComplianceSummary> {
        let governed: HashSet<TicketId> = self
            .tickets
            .list(tenant_id)
            .await?
            .into_iter()
            .filter(|t| t.sla_definition_id.is_some())
            .map(|t| t.id)
            .collect();
        let violations = self.store.list(tenant_id).await?;

        let violated: HashSet<TicketId> = violations
            .iter()
            .map(|v| v.ticket_id)
            .filter(|id| governed.contains(id))
            .collect();

        let total = governed.len();
        let compliance_rate = if total == 0 {
            100.0
        } else {
            100.0 * (total - violated.len()) as f64 / total as f64
        };

        Ok(ComplianceSummary {
            total_tickets: total,
            violated_tickets: violated.len(),
            compliance_rate,
            response_violations: violations
                .iter()
                .filter(|v| v.violation_type == ViolationType::ResponseTime)
                .count(),
            resolution_violations: violations
                .iter()
                .filter(|v| v.violation_type == ViolationType::ResolutionTime)
                .count(),
            open_violations: violations
                .iter()
                .filter(|v| v.status != ViolationStatus::Resolved)
                .count(),
        })
    }
}
