//! Ticket model and storage.
//!
//! Only the fields the lifecycle engine reads or mutates live here; the rest
//! of a ticket (description, comments, attachments) is owned elsewhere.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantAware, TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SlaError};
use crate::types::{DeadlineKind, Impact, SlaDefinitionId, TicketPriority, TicketStatus};

// ============================================================================
// Domain Types
// ============================================================================

/// A ticket as seen by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub title: String,
    /// Service type, first part of the SLA lookup key.
    pub service_type: String,
    pub category: Option<String>,
    pub priority: TicketPriority,
    pub impact: Impact,
    pub status: TicketStatus,
    /// Free-form attributes matched by automation rule conditions.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub assignee_id: Option<UserId>,
    /// User who raised the ticket.
    #[serde(default)]
    pub requester_id: Option<UserId>,
    pub sla_definition_id: Option<SlaDefinitionId>,
    pub sla_response_deadline: Option<DateTime<Utc>>,
    pub sla_resolution_deadline: Option<DateTime<Utc>>,
    pub escalation_level: u32,
}

impl Ticket {
    /// Create an open, unassigned ticket.
    pub fn new(
        tenant_id: TenantId,
        title: impl Into<String>,
        service_type: impl Into<String>,
        priority: TicketPriority,
        impact: Impact,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            tenant_id,
            title: title.into(),
            service_type: service_type.into(),
            category: None,
            priority,
            impact,
            status: TicketStatus::Open,
            attributes: BTreeMap::new(),
            created_at,
            updated_at: created_at,
            first_response_at: None,
            resolved_at: None,
            closed_at: None,
            assignee_id: None,
            requester_id: None,
            sla_definition_id: None,
            sla_response_deadline: None,
            sla_resolution_deadline: None,
            escalation_level: 0,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: UserId) -> Self {
        self.assignee_id = Some(assignee);
        self
    }

    #[must_use]
    pub fn with_requester(mut self, requester: UserId) -> Self {
        self.requester_id = Some(requester);
        self
    }

    /// Value of a named attribute as rule conditions see it.
    ///
    /// Built-in fields (`priority`, `type`, `category`, `impact`, `status`)
    /// take precedence over free-form attributes of the same name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "priority" => Some(self.priority.as_str().to_string()),
            "type" | "service_type" => Some(self.service_type.clone()),
            "category" => self.category.clone(),
            "impact" => Some(self.impact.to_string()),
            "status" => Some(self.status.as_str().to_string()),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// Deadline of the given kind, if one was computed.
    #[must_use]
    pub fn deadline(&self, kind: DeadlineKind) -> Option<DateTime<Utc>> {
        match kind {
            DeadlineKind::Response => self.sla_response_deadline,
            DeadlineKind::Resolution => self.sla_resolution_deadline,
        }
    }

    /// Whether the deadline of the given kind has already been met.
    #[must_use]
    pub fn deadline_met(&self, kind: DeadlineKind) -> bool {
        match kind {
            DeadlineKind::Response => self.first_response_at.is_some(),
            DeadlineKind::Resolution => self.resolved_at.is_some() || self.closed_at.is_some(),
        }
    }
}

impl TenantAware for Ticket {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for ticket storage backends.
#[async_trait::async_trait]
pub trait TicketStore: Send + Sync {
    /// Get a ticket by ID.
    async fn get(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>>;

    /// Insert a new ticket.
    async fn insert(&self, ticket: Ticket) -> Result<Ticket>;

    /// Replace an existing ticket. Fails with `TicketNotFound` if absent.
    async fn update(&self, ticket: Ticket) -> Result<Ticket>;

    /// List tickets whose status is one of `statuses`, oldest first.
    async fn list_by_status(
        &self,
        tenant_id: TenantId,
        statuses: &[TicketStatus],
    ) -> Result<Vec<Ticket>>;

    /// List every ticket of a tenant, oldest first.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Ticket>>;

    /// Count active tickets currently assigned to `assignee`.
    async fn count_open_by_assignee(&self, tenant_id: TenantId, assignee: UserId)
        -> Result<usize>;
}

// ============================================================================
// In-Memory Store (for testing)
// ============================================================================

/// In-memory ticket store for testing.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
}

impl InMemoryTicketStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get ticket count.
    pub async fn count(&self) -> usize {
        self.tickets.read().await.len()
    }

    fn sorted(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        tickets
    }
}

#[async_trait::async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(tickets
            .get(&id)
            .filter(|t| t.belongs_to(tenant_id))
            .cloned())
    }

    async fn insert(&self, ticket: Ticket) -> Result<Ticket> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(SlaError::Persistence(format!(
                "ticket {} already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn update(&self, ticket: Ticket) -> Result<Ticket> {
        let mut tickets = self.tickets.write().await;
        match tickets.get_mut(&ticket.id) {
            Some(existing) if existing.belongs_to(ticket.tenant_id) => {
                *existing = ticket.clone();
                Ok(ticket)
            }
            _ => Err(SlaError::TicketNotFound(ticket.id)),
        }
    }

    async fn list_by_status(
        &self,
        tenant_id: TenantId,
        statuses: &[TicketStatus],
    ) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(Self::sorted(
            tickets
                .values()
                .filter(|t| t.belongs_to(tenant_id) && statuses.contains(&t.status))
                .cloned()
                .collect(),
        ))
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(Self::sorted(
            tickets
                .values()
                .filter(|t| t.belongs_to(tenant_id))
                .cloned()
                .collect(),
        ))
    }

    async fn count_open_by_assignee(
        &self,
        tenant_id: TenantId,
        assignee: UserId,
    ) -> Result<usize> {
        let tickets = self.tickets.read().await;
        Ok(tickets
            .values()
            .filter(|t| {
                t.belongs_to(tenant_id) && t.status.is_active() && t.assignee_id == Some(assignee)
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ticket(tenant: TenantId, minutes: i64) -> Ticket {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        Ticket::new(
            tenant,
            "VPN down",
            "network",
            TicketPriority::High,
            Impact::Medium,
            t0 + Duration::minutes(minutes),
        )
    }

    #[test]
    fn test_attribute_lookup() {
        let t = ticket(TenantId::new(), 0)
            .with_category("access")
            .with_attribute("region", "emea")
            .with_attribute("priority", "ignored");

        assert_eq!(t.attribute("priority").as_deref(), Some("high"));
        assert_eq!(t.attribute("type").as_deref(), Some("network"));
        assert_eq!(t.attribute("category").as_deref(), Some("access"));
        assert_eq!(t.attribute("region").as_deref(), Some("emea"));
        assert_eq!(t.attribute("missing"), None);
    }

    #[test]
    fn test_deadline_met() {
        let mut t = ticket(TenantId::new(), 0);
        assert!(!t.deadline_met(DeadlineKind::Response));
        t.first_response_at = Some(t.created_at);
        assert!(t.deadline_met(DeadlineKind::Response));
        assert!(!t.deadline_met(DeadlineKind::Resolution));
        t.closed_at = Some(t.created_at);
        assert!(t.deadline_met(DeadlineKind::Resolution));
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let store = InMemoryTicketStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let t = store.insert(ticket(tenant_a, 0)).await.unwrap();

        assert!(store.get(tenant_a, t.id).await.unwrap().is_some());
        assert!(store.get(tenant_b, t.id).await.unwrap().is_none());

        let mut foreign = t.clone();
        foreign.tenant_id = tenant_b;
        assert!(matches!(
            store.update(foreign).await,
            Err(SlaError::TicketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_status_sorted_oldest_first() {
        let store = InMemoryTicketStore::new();
        let tenant = TenantId::new();
        let newer = store.insert(ticket(tenant, 30)).await.unwrap();
        let older = store.insert(ticket(tenant, 0)).await.unwrap();
        let mut done = ticket(tenant, 10);
        done.status = TicketStatus::Closed;
        store.insert(done).await.unwrap();

        let open = store
            .list_by_status(tenant, &[TicketStatus::Open])
            .await
            .unwrap();
        assert_eq!(
            open.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![older.id, newer.id]
        );
        assert_eq!(store.list(tenant).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_count_open_by_assignee() {
        let store = InMemoryTicketStore::new();
        let tenant = TenantId::new();
        let agent = UserId::new();

        store
            .insert(ticket(tenant, 0).with_assignee(agent))
            .await
            .unwrap();
        let mut resolved = ticket(tenant, 1).with_assignee(agent);
        resolved.status = TicketStatus::Resolved;
        store.insert(resolved).await.unwrap();

        assert_eq!(store.count_open_by_assignee(tenant, agent).await.unwrap(), 1);
        assert_eq!(
            store
                .count_open_by_assignee(tenant, UserId::new())
                .await
                .unwrap(),
            0
        );
    }
}
