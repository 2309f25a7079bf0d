//! SLA alert engine.
//!
//! Alert rules fire when the remaining share of a deadline drops to their
//! threshold. Each rule watches one deadline kind, so response and resolution
//! alerts form independent pools. At most one unresolved history row exists
//! per (ticket, rule); the store enforces this atomically.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantAware, TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::error::{Result, SlaError};
use crate::services::deadline::SlaDeadlineCalculator;
use crate::services::notification::{NotificationMessage, Notifier};
use crate::services::sla_definition::SlaDefinition;
use crate::ticket::Ticket;
use crate::types::{AlertHistoryId, AlertLevel, AlertRuleId, DeadlineKind, SlaDefinitionId};

// ============================================================================
// Domain Types
// ============================================================================

/// One step of a rule's escalation ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Level number, starting at 1.
    pub level: u32,
    /// Remaining percentage at or below which this level applies.
    pub threshold_percent: u8,
    /// Users notified when an alert reaches this level.
    #[serde(default)]
    pub notify_users: Vec<UserId>,
}

/// Threshold rule attached to an SLA definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaAlertRule {
    pub id: AlertRuleId,
    pub tenant_id: TenantId,
    pub sla_definition_id: SlaDefinitionId,
    pub name: String,
    /// Deadline this rule watches.
    pub applies_to: DeadlineKind,
    pub alert_level: AlertLevel,
    /// Remaining percentage (0-100) at or below which the rule fires.
    pub threshold_percentage: u8,
    pub escalation_enabled: bool,
    #[serde(default)]
    pub escalation_levels: Vec<EscalationLevel>,
    #[serde(default)]
    pub notification_channels: Vec<String>,
    pub is_active: bool,
    /// Stamped by [`SlaAlertEngine::upsert_rule`] on first save.
    pub created_at: DateTime<Utc>,
}

impl SlaAlertRule {
    /// Create an active rule without escalation.
    pub fn new(
        tenant_id: TenantId,
        sla_definition_id: SlaDefinitionId,
        name: impl Into<String>,
        applies_to: DeadlineKind,
        alert_level: AlertLevel,
        threshold_percentage: u8,
    ) -> Self {
        Self {
            id: AlertRuleId::new(),
            tenant_id,
            sla_definition_id,
            name: name.into(),
            applies_to,
            alert_level,
            threshold_percentage,
            escalation_enabled: false,
            escalation_levels: Vec::new(),
            notification_channels: Vec::new(),
            is_active: true,
            created_at: DateTime::default(),
        }
    }

    /// Enable escalation with the given ladder.
    #[must_use]
    pub fn with_escalation(mut self, levels: Vec<EscalationLevel>) -> Self {
        self.escalation_enabled = true;
        self.escalation_levels = levels;
        self
    }

    #[must_use]
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.notification_channels = channels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold_percentage > 100 {
            return Err(SlaError::Validation(format!(
                "alert threshold {}% is outside 0-100",
                self.threshold_percentage
            )));
        }
        let mut seen = HashSet::new();
        for level in &self.escalation_levels {
            if level.level == 0 {
                return Err(SlaError::Validation(
                    "escalation levels start at 1".to_string(),
                ));
            }
            if level.threshold_percent > 100 {
                return Err(SlaError::Validation(format!(
                    "escalation level {} threshold {}% is outside 0-100",
                    level.level, level.threshold_percent
                )));
            }
            if !seen.insert(level.level) {
                return Err(SlaError::Validation(format!(
                    "escalation level {} is defined twice",
                    level.level
                )));
            }
        }
        if self.escalation_enabled && self.escalation_levels.is_empty() {
            return Err(SlaError::Validation(
                "escalation is enabled but no levels are configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Highest level whose threshold has been reached at `remaining` percent.
    #[must_use]
    pub fn level_for(&self, remaining: f64) -> Option<&EscalationLevel> {
        self.escalation_levels
            .iter()
            .filter(|l| remaining <= f64::from(l.threshold_percent))
            .max_by_key(|l| l.level)
    }
}

impl TenantAware for SlaAlertRule {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaAlertHistory {
    pub id: AlertHistoryId,
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub alert_rule_id: AlertRuleId,
    pub deadline_kind: DeadlineKind,
    pub threshold_percentage: u8,
    /// Remaining percentage observed when the alert fired.
    pub actual_percentage: f64,
    pub notification_sent: bool,
    pub escalation_level: u32,
    pub created_at: DateTime<Utc>,
    /// Set once the underlying condition clears.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SlaAlertHistory {
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Filter for listing alert history.
#[derive(Debug, Clone, Default)]
pub struct AlertHistoryFilter {
    pub ticket_id: Option<TicketId>,
    pub alert_rule_id: Option<AlertRuleId>,
    pub unresolved_only: bool,
}

impl AlertHistoryFilter {
    fn matches(&self, row: &SlaAlertHistory) -> bool {
        self.ticket_id.map_or(true, |id| row.ticket_id == id)
            && self.alert_rule_id.map_or(true, |id| row.alert_rule_id == id)
            && (!self.unresolved_only || row.is_unresolved())
    }
}

/// What one alert check did for a ticket.
#[derive(Debug, Clone, Default)]
pub struct AlertCheckOutcome {
    /// Alerts raised in this check.
    pub created: Vec<SlaAlertHistory>,
    /// Unresolved alerts closed because their condition cleared.
    pub resolved: usize,
    /// Alerts raised to a higher escalation level.
    pub escalated: usize,
}

// ============================================================================
// Store Traits
// ============================================================================

/// Trait for alert rule storage backends.
#[async_trait::async_trait]
pub trait AlertRuleStore: Send + Sync {
    async fn get(&self, tenant_id: TenantId, id: AlertRuleId) -> Result<Option<SlaAlertRule>>;

    async fn upsert(&self, rule: SlaAlertRule) -> Result<SlaAlertRule>;

    /// List every rule of one SLA definition.
    async fn list_for_definition(
        &self,
        tenant_id: TenantId,
        sla_definition_id: SlaDefinitionId,
    ) -> Result<Vec<SlaAlertRule>>;
}

/// Trait for alert history storage backends.
#[async_trait::async_trait]
pub trait AlertHistoryStore: Send + Sync {
    /// Insert `row` unless an unresolved row exists for the same ticket and
    /// rule. Check and insert are one atomic step.
    async fn create_if_no_unresolved(&self, row: SlaAlertHistory)
        -> Result<Option<SlaAlertHistory>>;

    async fn get(&self, tenant_id: TenantId, id: AlertHistoryId)
        -> Result<Option<SlaAlertHistory>>;

    /// Unresolved rows of a ticket.
    async fn list_unresolved_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaAlertHistory>>;

    /// Mark a row as delivered.
    async fn mark_notified(&self, tenant_id: TenantId, id: AlertHistoryId) -> Result<()>;

    /// Raise the escalation level. Returns the row only if `level` is higher
    /// than the stored one.
    async fn raise_escalation_level(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
        level: u32,
    ) -> Result<Option<SlaAlertHistory>>;

    /// Resolve an unresolved row. Returns false if it was already resolved.
    async fn resolve(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// List rows matching `filter`, newest first.
    async fn list(
        &self,
        tenant_id: TenantId,
        filter: &AlertHistoryFilter,
    ) -> Result<Vec<SlaAlertHistory>>;
}

// ============================================================================
// In-Memory Stores (for testing)
// ============================================================================

/// In-memory alert rule store for testing.
#[derive(Debug, Default)]
pub struct InMemoryAlertRuleStore {
    rules: Arc<RwLock<HashMap<AlertRuleId, SlaAlertRule>>>,
}

impl InMemoryAlertRuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AlertRuleStore for InMemoryAlertRuleStore {
    async fn get(&self, tenant_id: TenantId, id: AlertRuleId) -> Result<Option<SlaAlertRule>> {
        let rules = self.rules.read().await;
        Ok(rules.get(&id).filter(|r| r.belongs_to(tenant_id)).cloned())
    }

    async fn upsert(&self, rule: SlaAlertRule) -> Result<SlaAlertRule> {
        let mut rules = self.rules.write().await;
        if let Some(existing) = rules.get(&rule.id) {
            if !existing.belongs_to(rule.tenant_id) {
                return Err(SlaError::TenantMismatch);
            }
        }
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn list_for_definition(
        &self,
        tenant_id: TenantId,
        sla_definition_id: SlaDefinitionId,
    ) -> Result<Vec<SlaAlertRule>> {
        let rules = self.rules.read().await;
        let mut list: Vec<_> = rules
            .values()
            .filter(|r| r.belongs_to(tenant_id) && r.sla_definition_id == sla_definition_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| (r.applies_to as u8, r.threshold_percentage));
        Ok(list)
    }
}

/// In-memory alert history store for testing.
#[derive(Debug, Default)]
pub struct InMemoryAlertHistoryStore {
    rows: Arc<RwLock<HashMap<AlertHistoryId, SlaAlertHistory>>>,
}

impl InMemoryAlertHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait::async_trait]
impl AlertHistoryStore for InMemoryAlertHistoryStore {
    async fn create_if_no_unresolved(
        &self,
        row: SlaAlertHistory,
    ) -> Result<Option<SlaAlertHistory>> {
        let mut rows = self.rows.write().await;
        let duplicate = rows.values().any(|r| {
            r.tenant_id == row.tenant_id
                && r.ticket_id == row.ticket_id
                && r.alert_rule_id == row.alert_rule_id
                && r.is_unresolved()
        });
        if duplicate {
            return Ok(None);
        }
        rows.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
    ) -> Result<Option<SlaAlertHistory>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|r| r.tenant_id == tenant_id).cloned())
    }

    async fn list_unresolved_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaAlertHistory>> {
        let filter = AlertHistoryFilter {
            ticket_id: Some(ticket_id),
            alert_rule_id: None,
            unresolved_only: true,
        };
        self.list(tenant_id, &filter).await
    }

    async fn mark_notified(&self, tenant_id: TenantId, id: AlertHistoryId) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(&id).filter(|r| r.tenant_id == tenant_id) {
            row.notification_sent = true;
        }
        Ok(())
    }

    async fn raise_escalation_level(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
        level: u32,
    ) -> Result<Option<SlaAlertHistory>> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id).filter(|r| r.tenant_id == tenant_id) {
            Some(row) if row.escalation_level < level => {
                row.escalation_level = level;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn resolve(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id).filter(|r| r.tenant_id == tenant_id) {
            Some(row) if row.is_unresolved() => {
                row.resolved_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        filter: &AlertHistoryFilter,
    ) -> Result<Vec<SlaAlertHistory>> {
        let rows = self.rows.read().await;
        let mut list: Vec<_> = rows
            .values()
            .filter(|r| r.tenant_id == tenant_id && filter.matches(r))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

// ============================================================================
// Alert Engine
// ============================================================================

/// Evaluates alert rules against a ticket's remaining SLA time.
pub struct SlaAlertEngine {
    rules: Arc<dyn AlertRuleStore>,
    history: Arc<dyn AlertHistoryStore>,
    calculator: SlaDeadlineCalculator,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl SlaAlertEngine {
    pub fn new(
        rules: Arc<dyn AlertRuleStore>,
        history: Arc<dyn AlertHistoryStore>,
        calculator: SlaDeadlineCalculator,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules,
            history,
            calculator,
            notifier,
            clock,
        }
    }

    /// Create or update an alert rule after validation.
    #[instrument(skip(self, rule), fields(alert_rule_id = %rule.id))]
    pub async fn upsert_rule(&self, mut rule: SlaAlertRule) -> Result<SlaAlertRule> {
        rule.validate()?;
        rule.created_at = match self.rules.get(rule.tenant_id, rule.id).await? {
            Some(existing) => existing.created_at,
            None => self.clock.now(),
        };
        let saved = self.rules.upsert(rule).await?;
        info!(
            alert_rule_id = %saved.id,
            threshold = saved.threshold_percentage,
            applies_to = %saved.applies_to,
            "SLA alert rule saved"
        );
        Ok(saved)
    }

    pub async fn get_rule(&self, tenant_id: TenantId, id: AlertRuleId) -> Result<SlaAlertRule> {
        self.rules
            .get(tenant_id, id)
            .await?
            .ok_or(SlaError::AlertRuleNotFound(id))
    }

    /// Active rules of a definition.
    pub async fn active_rules(
        &self,
        tenant_id: TenantId,
        sla_definition_id: SlaDefinitionId,
    ) -> Result<Vec<SlaAlertRule>> {
        Ok(self
            .rules
            .list_for_definition(tenant_id, sla_definition_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active)
            .collect())
    }

    /// Evaluate both deadline pools, then apply alert escalation.
    ///
    /// Safe to call repeatedly: an unresolved alert is never duplicated.
    #[instrument(skip(self, ticket, definition), fields(ticket_id = %ticket.id))]
    pub async fn check_and_trigger_alerts(
        &self,
        ticket: &Ticket,
        definition: &SlaDefinition,
    ) -> Result<AlertCheckOutcome> {
        let rules = self.active_rules(ticket.tenant_id, definition.id).await?;
        let mut outcome = AlertCheckOutcome::default();

        for kind in DeadlineKind::ALL {
            let pool: Vec<SlaAlertRule> = rules
                .iter()
                .filter(|r| r.applies_to == kind)
                .cloned()
                .collect();
            let (created, resolved) = self.evaluate(ticket, definition, kind, &pool).await?;
            outcome.created.extend(created);
            outcome.resolved += resolved;
        }

        outcome.escalated = self
            .process_alert_escalations(ticket, definition, &rules)
            .await?
            .len();

        if outcome.created.is_empty() && outcome.resolved == 0 && outcome.escalated == 0 {
            debug!("No alert changes");
        }
        Ok(outcome)
    }

    /// Evaluate one deadline kind against its rule pool.
    ///
    /// Returns the rows created and the number of rows resolved because their
    /// condition cleared.
    pub async fn evaluate(
        &self,
        ticket: &Ticket,
        definition: &SlaDefinition,
        kind: DeadlineKind,
        rules: &[SlaAlertRule],
    ) -> Result<(Vec<SlaAlertHistory>, usize)> {
        let now = self.clock.now();
        let unresolved: HashMap<AlertRuleId, SlaAlertHistory> = self
            .history
            .list_unresolved_for_ticket(ticket.tenant_id, ticket.id)
            .await?
            .into_iter()
            .filter(|r| r.deadline_kind == kind)
            .map(|r| (r.alert_rule_id, r))
            .collect();

        if ticket.deadline_met(kind) || !ticket.status.is_active() {
            let mut resolved = 0;
            for row in unresolved.values() {
                if self.history.resolve(ticket.tenant_id, row.id, now).await? {
                    resolved += 1;
                }
            }
            if resolved > 0 {
                info!(ticket_id = %ticket.id, kind = %kind, resolved, "SLA alerts cleared");
            }
            return Ok((Vec::new(), resolved));
        }

        let Some(deadline) = ticket.deadline(kind) else {
            return Ok((Vec::new(), 0));
        };
        let calendar = self.calculator.calendar_for(definition);
        let Some(remaining) = SlaDeadlineCalculator::remaining_percentage(
            deadline,
            ticket.created_at,
            now,
            calendar.as_ref(),
        ) else {
            // Past the deadline: the violation detector owns this case.
            return Ok((Vec::new(), 0));
        };

        let mut created = Vec::new();
        let mut resolved = 0;
        for rule in rules.iter().filter(|r| r.is_active && r.applies_to == kind) {
            if remaining <= f64::from(rule.threshold_percentage) {
                let row = SlaAlertHistory {
                    id: AlertHistoryId::new(),
                    tenant_id: ticket.tenant_id,
                    ticket_id: ticket.id,
                    alert_rule_id: rule.id,
                    deadline_kind: kind,
                    threshold_percentage: rule.threshold_percentage,
                    actual_percentage: remaining,
                    notification_sent: false,
                    escalation_level: 0,
                    created_at: now,
                    resolved_at: None,
                };
                let Some(mut row) = self.history.create_if_no_unresolved(row).await? else {
                    continue;
                };
                info!(
                    ticket_id = %ticket.id,
                    alert_rule_id = %rule.id,
                    kind = %kind,
                    remaining = remaining,
                    "SLA alert raised"
                );

                let recipients: Vec<UserId> = ticket.assignee_id.into_iter().collect();
                if recipients.is_empty() {
                    debug!(alert_id = %row.id, "No assignee to notify, alert left undelivered");
                    created.push(row);
                    continue;
                }
                let message = alert_message(ticket, rule, kind, remaining);
                if self.notifier.send_best_effort(&recipients, &message).await {
                    match self.history.mark_notified(ticket.tenant_id, row.id).await {
                        Ok(()) => row.notification_sent = true,
                        Err(e) => warn!(
                            alert_id = %row.id,
                            error = %e,
                            "Failed to record alert delivery"
                        ),
                    }
                }
                created.push(row);
            } else if let Some(row) = unresolved.get(&rule.id) {
                if self.history.resolve(ticket.tenant_id, row.id, now).await? {
                    resolved += 1;
                    info!(
                        ticket_id = %ticket.id,
                        alert_rule_id = %rule.id,
                        remaining = remaining,
                        "SLA alert condition cleared"
                    );
                }
            }
        }

        Ok((created, resolved))
    }

    /// Raise unresolved alerts of escalation-enabled rules to the highest
    /// level their remaining percentage has reached.
    ///
    /// Levels only go up. Each raise notifies that level's users.
    pub async fn process_alert_escalations(
        &self,
        ticket: &Ticket,
        definition: &SlaDefinition,
        rules: &[SlaAlertRule],
    ) -> Result<Vec<SlaAlertHistory>> {
        let now = self.clock.now();
        let calendar = self.calculator.calendar_for(definition);
        let by_id: HashMap<AlertRuleId, &SlaAlertRule> = rules
            .iter()
            .filter(|r| r.escalation_enabled)
            .map(|r| (r.id, r))
            .collect();

        let mut escalated = Vec::new();
        let unresolved = self
            .history
            .list_unresolved_for_ticket(ticket.tenant_id, ticket.id)
            .await?;

        for row in unresolved {
            let Some(rule) = by_id.get(&row.alert_rule_id) else {
                continue;
            };
            let Some(deadline) = ticket.deadline(row.deadline_kind) else {
                continue;
            };
            let remaining = SlaDeadlineCalculator::remaining_percentage(
                deadline,
                ticket.created_at,
                now,
                calendar.as_ref(),
            )
            .unwrap_or(0.0);

            let Some(level) = rule.level_for(remaining) else {
                continue;
            };
            let Some(raised) = self
                .history
                .raise_escalation_level(ticket.tenant_id, row.id, level.level)
                .await?
            else {
                continue;
            };

            info!(
                ticket_id = %ticket.id,
                alert_id = %raised.id,
                level = level.level,
                remaining = remaining,
                "SLA alert escalated"
            );
            if !level.notify_users.is_empty() {
                let message =
                    escalation_message(ticket, rule, row.deadline_kind, level, remaining);
                self.notifier
                    .send_best_effort(&level.notify_users, &message)
                    .await;
            }
            escalated.push(raised);
        }

        Ok(escalated)
    }

    /// Resolve unresolved alerts whose deadline the ticket has already met,
    /// or all of them once the ticket is no longer active.
    pub async fn resolve_cleared(&self, ticket: &Ticket) -> Result<usize> {
        let now = self.clock.now();
        let mut resolved = 0;
        for row in self
            .history
            .list_unresolved_for_ticket(ticket.tenant_id, ticket.id)
            .await?
        {
            let cleared = !ticket.status.is_active() || ticket.deadline_met(row.deadline_kind);
            if cleared && self.history.resolve(ticket.tenant_id, row.id, now).await? {
                resolved += 1;
            }
        }
        if resolved > 0 {
            info!(ticket_id = %ticket.id, resolved, "SLA alerts cleared");
        }
        Ok(resolved)
    }

    /// Resolve an alert explicitly.
    pub async fn resolve_alert(
        &self,
        tenant_id: TenantId,
        id: AlertHistoryId,
    ) -> Result<SlaAlertHistory> {
        let now = self.clock.now();
        if !self.history.resolve(tenant_id, id, now).await? {
            debug!(alert_id = %id, "Alert already resolved or missing");
        }
        self.history.get(tenant_id, id).await?.ok_or_else(|| {
            SlaError::Validation(format!("SLA alert {id} does not exist"))
        })
    }

    /// List alert history, newest first.
    pub async fn list_history(
        &self,
        tenant_id: TenantId,
        filter: &AlertHistoryFilter,
    ) -> Result<Vec<SlaAlertHistory>> {
        self.history.list(tenant_id, filter).await
    }
}

fn alert_message(
    ticket: &Ticket,
    rule: &SlaAlertRule,
    kind: DeadlineKind,
    remaining: f64,
) -> NotificationMessage {
    NotificationMessage {
        tenant_id: ticket.tenant_id,
        ticket_id: ticket.id,
        subject: format!("SLA {} alert: {} deadline approaching", rule.alert_level, kind),
        body: format!(
            "Ticket '{}' has {:.1}% of its {} time remaining (threshold {}%).",
            ticket.title, remaining, kind, rule.threshold_percentage
        ),
        channels: rule.notification_channels.clone(),
    }
}

fn escalation_message(
    ticket: &Ticket,
    rule: &SlaAlertRule,
    kind: DeadlineKind,
    level: &EscalationLevel,
    remaining: f64,
) -> NotificationMessage {
    NotificationMessage {
        tenant_id: ticket.tenant_id,
        ticket_id: ticket.id,
        subject: format!("SLA alert escalated to level {}", level.level),
        body: format!(
            "Ticket '{}' has {:.1}% of its {} time remaining; rule '{}' escalated to level {}.",
            ticket.title, remaining, kind, rule.name, level.level
        ),
        channels: rule.notification_channels.clone(),
    }
}
