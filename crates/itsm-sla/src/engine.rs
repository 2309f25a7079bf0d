//! SLA engine facade.
//!
//! Wires the tracker, catalog, calculator, detector, alert engine, router,
//! escalation and reminder services over one set of stores, and exposes the
//! operations the request-handling layer and the background jobs call.

use std::sync::Arc;

use itsm_core::{TenantId, TicketId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::audit::{InMemoryTransitionAuditStore, TransitionAuditStore};
use crate::clock::Clock;
use crate::config::SlaEngineConfig;
use crate::error::{Result, SlaError};
use crate::lifecycle::{TicketLifecycleTracker, TransitionOutcome};
use crate::services::{
    AlertCheckOutcome, AlertHistoryStore, AlertRuleStore, AutomationRuleStore, ComplianceSummary,
    EscalationEventStore, EscalationService, EscalationSweepStats, InMemoryAlertHistoryStore,
    InMemoryAlertRuleStore, InMemoryAutomationRuleStore, InMemoryEscalationEventStore,
    InMemoryReminderStore, InMemorySlaDefinitionStore, InMemoryViolationStore, NotificationSink,
    Notifier, ReminderPolicy, ReminderService, ReminderStats, ReminderStore, SlaAlertEngine,
    SlaCatalog, SlaDeadlineCalculator, SlaDeadlines, SlaDefinition, SlaDefinitionStore,
    SlaViolation, SlaViolationDetector, ViolationStore, WorkflowAutomationRouter,
};
use crate::ticket::{InMemoryTicketStore, Ticket, TicketStore};
use crate::types::{TicketPriority, TicketStatus};

/// Statuses in which an unassigned ticket is routed to an assignee.
const ASSIGNABLE_STATUSES: [TicketStatus; 3] = [
    TicketStatus::Open,
    TicketStatus::InProgress,
    TicketStatus::Reopened,
];

/// Storage backends the engine runs on.
#[derive(Clone)]
pub struct EngineStores {
    pub tickets: Arc<dyn TicketStore>,
    pub transitions: Arc<dyn TransitionAuditStore>,
    pub definitions: Arc<dyn SlaDefinitionStore>,
    pub alert_rules: Arc<dyn AlertRuleStore>,
    pub alert_history: Arc<dyn AlertHistoryStore>,
    pub violations: Arc<dyn ViolationStore>,
    pub automation: Arc<dyn AutomationRuleStore>,
    pub escalation_events: Arc<dyn EscalationEventStore>,
    pub reminders: Arc<dyn ReminderStore>,
}

impl EngineStores {
    /// Fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tickets: Arc::new(InMemoryTicketStore::new()),
            transitions: Arc::new(InMemoryTransitionAuditStore::new()),
            definitions: Arc::new(InMemorySlaDefinitionStore::new()),
            alert_rules: Arc::new(InMemoryAlertRuleStore::new()),
            alert_history: Arc::new(InMemoryAlertHistoryStore::new()),
            violations: Arc::new(InMemoryViolationStore::new()),
            automation: Arc::new(InMemoryAutomationRuleStore::new()),
            escalation_events: Arc::new(InMemoryEscalationEventStore::new()),
            reminders: Arc::new(InMemoryReminderStore::new()),
        }
    }
}

/// What one monitoring pass did for a ticket.
#[derive(Debug, Clone, Default)]
pub struct TicketMonitorReport {
    pub violations: Vec<SlaViolation>,
    pub alerts: AlertCheckOutcome,
}

/// The SLA-governed ticket lifecycle engine.
pub struct SlaEngine {
    tickets: Arc<dyn TicketStore>,
    definitions: Arc<dyn SlaDefinitionStore>,
    tracker: TicketLifecycleTracker,
    catalog: SlaCatalog,
    calculator: SlaDeadlineCalculator,
    detector: SlaViolationDetector,
    alerts: SlaAlertEngine,
    router: Arc<WorkflowAutomationRouter>,
    escalation: EscalationService,
    reminders: ReminderService,
    config: SlaEngineConfig,
}

impl SlaEngine {
    /// Wire an engine over `stores`.
    pub fn new(
        stores: EngineStores,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: SlaEngineConfig,
    ) -> Self {
        let calculator = SlaDeadlineCalculator::for_kind(config.default_calendar);
        let notifier = Notifier::new(sink, config.notification_timeout);
        let router = Arc::new(WorkflowAutomationRouter::new(
            Arc::clone(&stores.automation),
            Arc::clone(&stores.tickets),
            config.default_assignee,
            Arc::clone(&clock),
        ));

        Self {
            tracker: TicketLifecycleTracker::new(
                Arc::clone(&stores.tickets),
                Arc::clone(&stores.transitions),
                Arc::clone(&clock),
            ),
            catalog: SlaCatalog::new(Arc::clone(&stores.definitions), Arc::clone(&clock)),
            detector: SlaViolationDetector::new(
                Arc::clone(&stores.violations),
                Arc::clone(&stores.tickets),
                calculator.clone(),
                Arc::clone(&clock),
            ),
            alerts: SlaAlertEngine::new(
                Arc::clone(&stores.alert_rules),
                Arc::clone(&stores.alert_history),
                calculator.clone(),
                notifier.clone(),
                Arc::clone(&clock),
            ),
            escalation: EscalationService::new(
                Arc::clone(&stores.tickets),
                Arc::clone(&stores.automation),
                Arc::clone(&stores.escalation_events),
                Arc::clone(&router),
                Arc::clone(&clock),
            ),
            reminders: ReminderService::new(
                Arc::clone(&stores.tickets),
                stores.reminders,
                notifier,
                clock,
                ReminderPolicy::from_config(&config),
            ),
            router,
            calculator,
            tickets: stores.tickets,
            definitions: stores.definitions,
            config,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &TicketLifecycleTracker {
        &self.tracker
    }

    #[must_use]
    pub fn catalog(&self) -> &SlaCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn calculator(&self) -> &SlaDeadlineCalculator {
        &self.calculator
    }

    #[must_use]
    pub fn violations(&self) -> &SlaViolationDetector {
        &self.detector
    }

    #[must_use]
    pub fn alerts(&self) -> &SlaAlertEngine {
        &self.alerts
    }

    #[must_use]
    pub fn router(&self) -> &WorkflowAutomationRouter {
        &self.router
    }

    #[must_use]
    pub fn escalation(&self) -> &EscalationService {
        &self.escalation
    }

    #[must_use]
    pub fn reminders(&self) -> &ReminderService {
        &self.reminders
    }

    #[must_use]
    pub fn config(&self) -> &SlaEngineConfig {
        &self.config
    }

    /// Load a ticket or fail with `TicketNotFound`.
    pub async fn ticket(&self, tenant_id: TenantId, ticket_id: TicketId) -> Result<Ticket> {
        self.tickets
            .get(tenant_id, ticket_id)
            .await?
            .ok_or(SlaError::TicketNotFound(ticket_id))
    }

    /// Definition linked to a ticket, if any.
    async fn governing_definition(&self, ticket: &Ticket) -> Result<Option<SlaDefinition>> {
        let Some(id) = ticket.sla_definition_id else {
            return Ok(None);
        };
        let definition = self.definitions.get(ticket.tenant_id, id).await?;
        if definition.is_none() {
            warn!(
                ticket_id = %ticket.id,
                sla_definition_id = %id,
                "Ticket references a missing SLA definition"
            );
        }
        Ok(definition)
    }

    /// Link `definition` (or nothing) to `ticket` and set its deadlines.
    /// Returns whether anything changed.
    fn apply_sla(&self, ticket: &mut Ticket, definition: Option<&SlaDefinition>) -> bool {
        let (id, response, resolution) = match definition {
            Some(definition) => {
                let deadlines = self.calculator.compute_deadlines(ticket, definition);
                (
                    Some(definition.id),
                    Some(deadlines.response),
                    Some(deadlines.resolution),
                )
            }
            None => (None, None, None),
        };
        let changed = ticket.sla_definition_id != id
            || ticket.sla_response_deadline != response
            || ticket.sla_resolution_deadline != resolution;
        ticket.sla_definition_id = id;
        ticket.sla_response_deadline = response;
        ticket.sla_resolution_deadline = resolution;
        changed
    }

    /// Route an unassigned ticket. Failures are logged and leave the ticket
    /// unassigned.
    async fn auto_assign(&self, ticket: Ticket) -> Ticket {
        if ticket.assignee_id.is_some() || !ASSIGNABLE_STATUSES.contains(&ticket.status) {
            return ticket;
        }
        let assignee = match self.router.auto_assign(&ticket).await {
            Ok(Some(assignee)) => assignee,
            Ok(None) => {
                debug!(ticket_id = %ticket.id, "No assignee available");
                return ticket;
            }
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Auto-assignment failed");
                return ticket;
            }
        };

        let mut assigned = ticket.clone();
        assigned.assignee_id = Some(assignee);
        match self.tickets.update(assigned).await {
            Ok(saved) => {
                info!(ticket_id = %saved.id, assignee = %assignee, "Ticket auto-assigned");
                saved
            }
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Failed to store auto-assignment");
                ticket
            }
        }
    }

    /// Accept a new ticket: match its SLA, compute deadlines, store it and
    /// route it if unassigned.
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    pub async fn register_ticket(&self, mut ticket: Ticket) -> Result<Ticket> {
        let definition = self
            .catalog
            .find_applicable(
                ticket.tenant_id,
                &ticket.service_type,
                ticket.priority,
                ticket.impact,
            )
            .await?;
        self.apply_sla(&mut ticket, definition.as_ref());

        let ticket = self.tickets.insert(ticket).await?;
        info!(
            ticket_id = %ticket.id,
            governed = ticket.sla_definition_id.is_some(),
            "Ticket registered"
        );
        Ok(self.auto_assign(ticket).await)
    }

    /// Apply a status change, refresh deadlines and route the ticket if it
    /// is still unassigned.
    #[instrument(skip(self, reason))]
    pub async fn transition_status(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        to: TicketStatus,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<TransitionOutcome> {
        let ticket = self.ticket(tenant_id, ticket_id).await?;
        let mut outcome = self.tracker.transition(ticket, to, user_id, reason).await?;

        if let Some(definition) = self.governing_definition(&outcome.ticket).await? {
            let mut refreshed = outcome.ticket.clone();
            if self.apply_sla(&mut refreshed, Some(&definition)) {
                outcome.ticket = self.tickets.update(refreshed).await?;
            }
        }
        if let Err(e) = self.alerts.resolve_cleared(&outcome.ticket).await {
            warn!(ticket_id = %ticket_id, error = %e, "Failed to clear SLA alerts");
        }

        outcome.ticket = self.auto_assign(outcome.ticket).await;
        Ok(outcome)
    }

    /// Change priority, re-match the SLA definition and recompute deadlines.
    ///
    /// When no definition matches the new key the ticket stops being governed.
    #[instrument(skip(self))]
    pub async fn change_priority(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        priority: TicketPriority,
        user_id: UserId,
    ) -> Result<Ticket> {
        let ticket = self.ticket(tenant_id, ticket_id).await?;
        let mut ticket = self.tracker.change_priority(ticket, priority, user_id).await?;

        let definition = self
            .catalog
            .find_applicable(tenant_id, &ticket.service_type, ticket.priority, ticket.impact)
            .await?;
        if self.apply_sla(&mut ticket, definition.as_ref()) {
            ticket = self.tickets.update(ticket).await?;
            info!(
                ticket_id = %ticket.id,
                governed = ticket.sla_definition_id.is_some(),
                "SLA deadlines recomputed after priority change"
            );
        }
        Ok(ticket)
    }

    /// Compute and store deadlines. `None` means no SLA governs the ticket.
    ///
    /// An unlinked ticket is matched against the catalog first.
    #[instrument(skip(self))]
    pub async fn compute_sla_deadlines(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Option<SlaDeadlines>> {
        let mut ticket = self.ticket(tenant_id, ticket_id).await?;
        let definition = match self.governing_definition(&ticket).await? {
            Some(definition) => Some(definition),
            None => {
                self.catalog
                    .find_applicable(tenant_id, &ticket.service_type, ticket.priority, ticket.impact)
                    .await?
            }
        };
        let Some(definition) = definition else {
            return Ok(None);
        };

        let deadlines = self.calculator.compute_deadlines(&ticket, &definition);
        if self.apply_sla(&mut ticket, Some(&definition)) {
            self.tickets.update(ticket).await?;
        }
        Ok(Some(deadlines))
    }

    /// Evaluate alert rules for a ticket. A no-op for ungoverned tickets.
    pub async fn check_and_trigger_alerts(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<AlertCheckOutcome> {
        let ticket = self.ticket(tenant_id, ticket_id).await?;
        match self.governing_definition(&ticket).await? {
            Some(definition) => self.alerts.check_and_trigger_alerts(&ticket, &definition).await,
            None => Ok(AlertCheckOutcome::default()),
        }
    }

    /// Record new SLA violations for a ticket. A no-op for ungoverned tickets.
    pub async fn check_sla_violations(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<SlaViolation>> {
        let ticket = self.ticket(tenant_id, ticket_id).await?;
        match self.governing_definition(&ticket).await? {
            Some(definition) => self.detector.check_violations(&ticket, &definition).await,
            None => Ok(Vec::new()),
        }
    }

    /// Violation check followed by alert evaluation for one loaded ticket.
    pub async fn monitor_ticket(&self, ticket: &Ticket) -> Result<TicketMonitorReport> {
        let Some(definition) = self.governing_definition(ticket).await? else {
            return Ok(TicketMonitorReport::default());
        };
        Ok(TicketMonitorReport {
            violations: self.detector.check_violations(ticket, &definition).await?,
            alerts: self.alerts.check_and_trigger_alerts(ticket, &definition).await?,
        })
    }

    /// One escalation pass over a tenant's open work.
    pub async fn run_escalation_sweep(&self, tenant_id: TenantId) -> Result<EscalationSweepStats> {
        self.escalation.run_sweep(tenant_id).await
    }

    /// One pass of long-pending and unassigned reminders.
    pub async fn run_reminders(&self, tenant_id: TenantId) -> Result<ReminderStats> {
        self.reminders.run(tenant_id).await
    }

    /// Reassign a ticket unconditionally.
    pub async fn manual_escalate(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
        escalate_to: UserId,
        reason: &str,
        actor_id: Option<UserId>,
    ) -> Result<Ticket> {
        self.escalation
            .manual_escalate(tenant_id, ticket_id, escalate_to, reason, actor_id)
            .await
    }

    /// SLA compliance figures for a tenant.
    pub async fn compliance_summary(&self, tenant_id: TenantId) -> Result<ComplianceSummary> {
        self.detector.compliance_summary(tenant_id).await
    }

    /// Tickets the monitoring job should look at.
    pub async fn active_tickets(&self, tenant_id: TenantId) -> Result<Vec<Ticket>> {
        let statuses: Vec<TicketStatus> = TicketStatus::ALL
            .into_iter()
            .filter(TicketStatus::is_active)
            .collect();
        self.tickets.list_by_status(tenant_id, &statuses).await
    }
}
