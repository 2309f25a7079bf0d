//! Automatic and manual ticket escalation.
//!
//! The sweep walks open work (`pending`, `in_progress`) and applies the first
//! matching time-limit rule to each item. A rule fires at most once per
//! ticket. Failures on one item are logged and counted; the sweep continues
//! with the next.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::error::{Result, SlaError};
use crate::services::automation::{AutoEscalationRule, AutomationRuleStore};
use crate::services::router::WorkflowAutomationRouter;
use crate::ticket::{Ticket, TicketStore};
use crate::types::{EscalationEventId, EscalationReason, EscalationRuleId, TicketStatus};

/// Statuses the sweep considers open work.
pub const SWEEP_STATUSES: [TicketStatus; 2] = [TicketStatus::Pending, TicketStatus::InProgress];

// ============================================================================
// Domain Types
// ============================================================================

/// Audit record of one escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub id: EscalationEventId,
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    /// Escalation level after this event.
    pub level: u32,
    pub previous_assignee: Option<UserId>,
    pub new_assignee: UserId,
    pub reason: EscalationReason,
    /// Rule that fired, for automatic escalations.
    pub rule_id: Option<EscalationRuleId>,
    pub actor_id: Option<UserId>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// An item the sweep would escalate right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationCandidate {
    pub ticket_id: TicketId,
    pub rule_id: EscalationRuleId,
    pub rule_name: String,
    pub current_assignee: Option<UserId>,
    pub current_level: u32,
    /// Minutes past the rule's time limit.
    pub minutes_over_limit: i64,
}

/// Statistics from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationSweepStats {
    /// Items examined.
    pub processed: usize,
    /// Items reassigned.
    pub escalated: usize,
    /// Items whose first matching rule already fired for them or already
    /// targets their assignee.
    pub already_escalated: usize,
    /// Items that failed.
    pub failed: usize,
}

impl EscalationSweepStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &EscalationSweepStats) {
        self.processed += other.processed;
        self.escalated += other.escalated;
        self.already_escalated += other.already_escalated;
        self.failed += other.failed;
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for escalation audit storage backends. Append-only.
#[async_trait::async_trait]
pub trait EscalationEventStore: Send + Sync {
    async fn append(&self, event: EscalationEvent) -> Result<()>;

    /// Events of one ticket, oldest first.
    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<EscalationEvent>>;
}

/// In-memory escalation event store for testing.
#[derive(Debug, Default)]
pub struct InMemoryEscalationEventStore {
    events: Arc<RwLock<Vec<EscalationEvent>>>,
}

impl InMemoryEscalationEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait::async_trait]
impl EscalationEventStore for InMemoryEscalationEventStore {
    async fn append(&self, event: EscalationEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<EscalationEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Escalation Service
// ============================================================================

enum ItemOutcome {
    Untouched,
    AlreadyEscalated,
    Escalated,
}

/// Applies escalation rules and manual overrides.
pub struct EscalationService {
    tickets: Arc<dyn TicketStore>,
    rules: Arc<dyn AutomationRuleStore>,
    events: Arc<dyn EscalationEventStore>,
    router: Arc<WorkflowAutomationRouter>,
    clock: Arc<dyn Clock>,
}

impl EscalationService {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        rules: Arc<dyn AutomationRuleStore>,
        events: Arc<dyn EscalationEventStore>,
        router: Arc<WorkflowAutomationRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            rules,
            events,
            router,
            clock,
        }
    }

    /// Create or update an escalation rule after validation.
    pub async fn upsert_rule(&self, mut rule: AutoEscalationRule) -> Result<AutoEscalationRule> {
        rule.validate()?;
        rule.created_at = match self.rules.get_escalation_rule(rule.tenant_id, rule.id).await? {
            Some(existing) => existing.created_at,
            None => self.clock.now(),
        };
        let saved = self.rules.upsert_escalation_rule(rule).await?;
        info!(
            rule_id = %saved.id,
            priority_order = saved.priority_order,
            target = %saved.escalate_to,
            "Escalation rule saved"
        );
        Ok(saved)
    }

    pub async fn get_rule(
        &self,
        tenant_id: TenantId,
        id: EscalationRuleId,
    ) -> Result<AutoEscalationRule> {
        self.rules
            .get_escalation_rule(tenant_id, id)
            .await?
            .ok_or(SlaError::EscalationRuleNotFound(id))
    }

    /// Active rules in evaluation order: `priority_order`, then creation time.
    async fn active_rules(&self, tenant_id: TenantId) -> Result<Vec<AutoEscalationRule>> {
        let mut rules: Vec<_> = self
            .rules
            .list_escalation_rules(tenant_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active)
            .collect();
        rules.sort_by_key(AutoEscalationRule::evaluation_key);
        Ok(rules)
    }

    /// One pass over a tenant's open work.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self, tenant_id: TenantId) -> Result<EscalationSweepStats> {
        let now = self.clock.now();
        let rules = self.active_rules(tenant_id).await?;
        let items = self.tickets.list_by_status(tenant_id, &SWEEP_STATUSES).await?;
        let mut stats = EscalationSweepStats::default();

        if rules.is_empty() || items.is_empty() {
            debug!(rules = rules.len(), items = items.len(), "Nothing to escalate");
            stats.processed = items.len();
            return Ok(stats);
        }

        for ticket in items {
            stats.processed += 1;
            let ticket_id = ticket.id;
            match self.escalate_item(ticket, &rules, now).await {
                Ok(ItemOutcome::Escalated) => stats.escalated += 1,
                Ok(ItemOutcome::AlreadyEscalated) => stats.already_escalated += 1,
                Ok(ItemOutcome::Untouched) => {}
                Err(e) => {
                    warn!(ticket_id = %ticket_id, error = %e, "Failed to escalate ticket");
                    stats.failed += 1;
                }
            }
        }

        if stats.escalated > 0 || stats.failed > 0 {
            info!(
                processed = stats.processed,
                escalated = stats.escalated,
                already_escalated = stats.already_escalated,
                failed = stats.failed,
                "Escalation sweep complete"
            );
        } else {
            debug!(processed = stats.processed, "Escalation sweep found nothing to do");
        }
        Ok(stats)
    }

    /// Apply the first matching rule to one item.
    async fn escalate_item(
        &self,
        ticket: Ticket,
        rules: &[AutoEscalationRule],
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome> {
        let Some(rule) = rules.iter().find(|r| r.applies(&ticket, now)) else {
            return Ok(ItemOutcome::Untouched);
        };
        if self.has_fired(&ticket, rule).await? {
            return Ok(ItemOutcome::AlreadyEscalated);
        }

        let target = self
            .router
            .resolve_target(ticket.tenant_id, &rule.escalate_to, &ticket)
            .await?;
        if ticket.assignee_id == Some(target) {
            return Ok(ItemOutcome::AlreadyEscalated);
        }

        let comment = format!(
            "Auto-escalated by rule '{}': open for more than {} minutes",
            rule.name, rule.time_limit_minutes
        );
        self.apply(
            ticket,
            target,
            EscalationReason::Timeout,
            Some(rule.id),
            None,
            comment,
            now,
        )
        .await?;
        Ok(ItemOutcome::Escalated)
    }

    /// Whether `rule` has already escalated `ticket`.
    async fn has_fired(&self, ticket: &Ticket, rule: &AutoEscalationRule) -> Result<bool> {
        Ok(self
            .events
            .list_for_ticket(ticket.tenant_id, ticket.id)
            .await?
            .iter()
            .any(|e| e.rule_id == Some(rule.id)))
    }

    /// Reassign a ticket unconditionally, bypassing rule matching.
    #[instrument(skip(self, reason))]
    pub async fn manual_escalate(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        escalate_to: UserId,
        reason: &str,
        actor_id: Option<UserId>,
    ) -> Result<Ticket> {
        let ticket = self
            .tickets
            .get(tenant_id, ticket_id)
            .await?
            .ok_or(SlaError::TicketNotFound(ticket_id))?;
        let now = self.clock.now();
        self.apply(
            ticket,
            escalate_to,
            EscalationReason::ManualEscalation,
            None,
            actor_id,
            reason.to_string(),
            now,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        mut ticket: Ticket,
        new_assignee: UserId,
        reason: EscalationReason,
        rule_id: Option<EscalationRuleId>,
        actor_id: Option<UserId>,
        comment: String,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        let previous_assignee = ticket.assignee_id;
        ticket.assignee_id = Some(new_assignee);
        ticket.escalation_level += 1;
        ticket.updated_at = now;
        let ticket = self.tickets.update(ticket).await?;

        info!(
            ticket_id = %ticket.id,
            level = ticket.escalation_level,
            reason = %reason,
            new_assignee = %new_assignee,
            "Ticket escalated"
        );

        let event = EscalationEvent {
            id: EscalationEventId::new(),
            tenant_id: ticket.tenant_id,
            ticket_id: ticket.id,
            level: ticket.escalation_level,
            previous_assignee,
            new_assignee,
            reason,
            rule_id,
            actor_id,
            comment,
            created_at: now,
        };
        if let Err(e) = self.events.append(event).await {
            warn!(ticket_id = %ticket.id, error = %e, "Failed to record escalation event");
        }
        Ok(ticket)
    }

    /// Items the next sweep would escalate, without changing anything.
    pub async fn candidates(&self, tenant_id: TenantId) -> Result<Vec<EscalationCandidate>> {
        let now = self.clock.now();
        let rules = self.active_rules(tenant_id).await?;
        let items = self.tickets.list_by_status(tenant_id, &SWEEP_STATUSES).await?;

        let mut candidates = Vec::new();
        for ticket in &items {
            let Some(rule) = rules.iter().find(|r| r.applies(ticket, now)) else {
                continue;
            };
            if self.has_fired(ticket, rule).await? {
                continue;
            }
            let limit = chrono::Duration::minutes(i64::from(rule.time_limit_minutes));
            candidates.push(EscalationCandidate {
                ticket_id: ticket.id,
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                current_assignee: ticket.assignee_id,
                current_level: ticket.escalation_level,
                minutes_over_limit: (now - ticket.created_at - limit).num_minutes(),
            });
        }
        Ok(candidates)
    }

    /// Escalation history of a ticket.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<EscalationEvent>> {
        self.events.list_for_ticket(tenant_id, ticket_id).await
    }
}
