//! One-time ticket reminders.
//!
//! Two conditions are reported once per occurrence: a ticket that stays
//! active long after creation, and a ticket that nobody picked up. An
//! unresolved reminder row suppresses further reminders of the same kind for
//! the ticket; the row is resolved when the condition clears, so a later
//! recurrence reminds again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use itsm_core::{TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::SlaEngineConfig;
use crate::error::Result;
use crate::services::notification::{NotificationMessage, Notifier};
use crate::ticket::{Ticket, TicketStore};
use crate::types::{ReminderId, ReminderKind};

// ============================================================================
// Domain Types
// ============================================================================

/// A sent (or attempted) reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketReminder {
    pub id: ReminderId,
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub kind: ReminderKind,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    /// Set once the condition no longer holds.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TicketReminder {
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// When reminders fire and who else hears about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Age at which an active ticket counts as long pending.
    pub long_pending_after: Duration,
    /// Age at which an unassigned active ticket is reported.
    pub unassigned_after: Duration,
    /// Extra recipients of every reminder.
    pub supervisors: Vec<UserId>,
}

impl ReminderPolicy {
    #[must_use]
    pub fn from_config(config: &SlaEngineConfig) -> Self {
        Self {
            long_pending_after: Duration::minutes(i64::from(config.long_pending_minutes)),
            unassigned_after: Duration::minutes(i64::from(config.unassigned_minutes)),
            supervisors: config.supervisors.clone(),
        }
    }

    /// Whether `ticket` is in the `kind` condition at `now`.
    #[must_use]
    pub fn is_due(&self, ticket: &Ticket, kind: ReminderKind, now: DateTime<Utc>) -> bool {
        if !ticket.status.is_active() {
            return false;
        }
        let age = now - ticket.created_at;
        match kind {
            ReminderKind::LongPending => age >= self.long_pending_after,
            ReminderKind::Unassigned => {
                ticket.assignee_id.is_none() && age >= self.unassigned_after
            }
        }
    }

    /// Recipients of a `kind` reminder for `ticket`, without duplicates.
    #[must_use]
    pub fn recipients(&self, ticket: &Ticket, kind: ReminderKind) -> Vec<UserId> {
        let own = match kind {
            ReminderKind::LongPending => vec![ticket.requester_id, ticket.assignee_id],
            ReminderKind::Unassigned => Vec::new(),
        };
        let mut recipients: Vec<UserId> = Vec::new();
        for user in own.into_iter().flatten().chain(self.supervisors.iter().copied()) {
            if !recipients.contains(&user) {
                recipients.push(user);
            }
        }
        recipients
    }
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::from_config(&SlaEngineConfig::default())
    }
}

/// Statistics from one reminder pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderStats {
    /// Tickets examined.
    pub checked: usize,
    /// Long-pending reminders raised.
    pub long_pending: usize,
    /// Unassigned reminders raised.
    pub unassigned: usize,
    /// Reminders resolved because their condition cleared.
    pub cleared: usize,
    /// Tickets that failed.
    pub failed: usize,
}

impl ReminderStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &ReminderStats) {
        self.checked += other.checked;
        self.long_pending += other.long_pending;
        self.unassigned += other.unassigned;
        self.cleared += other.cleared;
        self.failed += other.failed;
    }

    fn record(&mut self, kind: ReminderKind) {
        match kind {
            ReminderKind::LongPending => self.long_pending += 1,
            ReminderKind::Unassigned => self.unassigned += 1,
        }
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for reminder storage backends.
#[async_trait::async_trait]
pub trait ReminderStore: Send + Sync {
    /// Insert `row` unless an unresolved row exists for the same ticket and
    /// kind. Check and insert are one atomic step.
    async fn create_if_no_unresolved(&self, row: TicketReminder) -> Result<Option<TicketReminder>>;

    /// Unresolved rows of a tenant.
    async fn list_unresolved(&self, tenant_id: TenantId) -> Result<Vec<TicketReminder>>;

    /// Rows of one ticket, oldest first.
    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketReminder>>;

    async fn mark_notified(&self, tenant_id: TenantId, id: ReminderId) -> Result<()>;

    /// Resolve an unresolved row. Returns false if it was already resolved.
    async fn resolve(&self, tenant_id: TenantId, id: ReminderId, at: DateTime<Utc>)
        -> Result<bool>;
}

/// In-memory reminder store for testing.
#[derive(Debug, Default)]
pub struct InMemoryReminderStore {
    rows: Arc<RwLock<Vec<TicketReminder>>>,
}

impl InMemoryReminderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait::async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn create_if_no_unresolved(&self, row: TicketReminder) -> Result<Option<TicketReminder>> {
        let mut rows = self.rows.write().await;
        let duplicate = rows.iter().any(|r| {
            r.tenant_id == row.tenant_id
                && r.ticket_id == row.ticket_id
                && r.kind == row.kind
                && r.is_unresolved()
        });
        if duplicate {
            return Ok(None);
        }
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn list_unresolved(&self, tenant_id: TenantId) -> Result<Vec<TicketReminder>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.is_unresolved())
            .cloned()
            .collect())
    }

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketReminder>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, tenant_id: TenantId, id: ReminderId) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
        {
            row.notification_sent = true;
        }
        Ok(())
    }

    async fn resolve(
        &self,
        tenant_id: TenantId,
        id: ReminderId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
        {
            Some(row) if row.is_unresolved() => {
                row.resolved_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Reminder Service
// ============================================================================

/// Sends long-pending and unassigned reminders.
pub struct ReminderService {
    tickets: Arc<dyn TicketStore>,
    store: Arc<dyn ReminderStore>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    policy: ReminderPolicy,
}

impl ReminderService {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        store: Arc<dyn ReminderStore>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
    ) -> Self {
        Self {
            tickets,
            store,
            notifier,
            clock,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// One reminder pass over a tenant's tickets.
    ///
    /// Failures on one ticket are logged and counted; only failing to load
    /// the tickets or the open reminders aborts the pass.
    #[instrument(skip(self))]
    pub async fn run(&self, tenant_id: TenantId) -> Result<ReminderStats> {
        let now = self.clock.now();
        let tickets = self.tickets.list(tenant_id).await?;
        let open: HashMap<(TicketId, ReminderKind), TicketReminder> = self
            .store
            .list_unresolved(tenant_id)
            .await?
            .into_iter()
            .map(|r| ((r.ticket_id, r.kind), r))
            .collect();

        let mut stats = ReminderStats::default();
        for ticket in &tickets {
            stats.checked += 1;
            for kind in ReminderKind::ALL {
                let due = self.policy.is_due(ticket, kind, now);
                let result = match (due, open.get(&(ticket.id, kind))) {
                    (true, None) => self.remind(ticket, kind, now).await.map(|raised| {
                        if raised {
                            stats.record(kind);
                        }
                    }),
                    (false, Some(row)) => {
                        self.store.resolve(tenant_id, row.id, now).await.map(|resolved| {
                            if resolved {
                                debug!(ticket_id = %ticket.id, kind = %kind, "Reminder cleared");
                                stats.cleared += 1;
                            }
                        })
                    }
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    warn!(ticket_id = %ticket.id, kind = %kind, error = %e, "Failed to process reminder");
                    stats.failed += 1;
                }
            }
        }

        if stats.long_pending > 0 || stats.unassigned > 0 || stats.failed > 0 {
            info!(
                checked = stats.checked,
                long_pending = stats.long_pending,
                unassigned = stats.unassigned,
                cleared = stats.cleared,
                failed = stats.failed,
                "Reminder pass complete"
            );
        }
        Ok(stats)
    }

    /// Record and send one reminder. Returns false if an unresolved row
    /// already covers it.
    async fn remind(&self, ticket: &Ticket, kind: ReminderKind, now: DateTime<Utc>) -> Result<bool> {
        let row = TicketReminder {
            id: ReminderId::new(),
            tenant_id: ticket.tenant_id,
            ticket_id: ticket.id,
            kind,
            notification_sent: false,
            created_at: now,
            resolved_at: None,
        };
        let Some(row) = self.store.create_if_no_unresolved(row).await? else {
            return Ok(false);
        };
        info!(ticket_id = %ticket.id, kind = %kind, "Ticket reminder raised");

        let recipients = self.policy.recipients(ticket, kind);
        if recipients.is_empty() {
            debug!(reminder_id = %row.id, "No reminder recipients");
            return Ok(true);
        }
        let message = reminder_message(ticket, kind, now);
        if self.notifier.send_best_effort(&recipients, &message).await {
            if let Err(e) = self.store.mark_notified(ticket.tenant_id, row.id).await {
                warn!(reminder_id = %row.id, error = %e, "Failed to record reminder delivery");
            }
        }
        Ok(true)
    }

    /// Reminder history of a ticket.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<TicketReminder>> {
        self.store.list_for_ticket(tenant_id, ticket_id).await
    }
}

fn reminder_message(ticket: &Ticket, kind: ReminderKind, now: DateTime<Utc>) -> NotificationMessage {
    let hours = (now - ticket.created_at).num_hours();
    let (subject, body) = match kind {
        ReminderKind::LongPending => (
            format!("Ticket '{}' is still open", ticket.title),
            format!(
                "Ticket '{}' has been open for {hours} hours without resolution.",
                ticket.title
            ),
        ),
        ReminderKind::Unassigned => (
            format!("Ticket '{}' has no assignee", ticket.title),
            format!(
                "Ticket '{}' has waited {hours} hours without an assignee.",
                ticket.title
            ),
        ),
    };
    NotificationMessage {
        tenant_id: ticket.tenant_id,
        ticket_id: ticket.id,
        subject,
        body,
        channels: Vec::new(),
    }
}
