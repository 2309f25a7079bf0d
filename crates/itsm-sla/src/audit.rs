//! Append-only audit trail of ticket status transitions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{TicketStatus, TransitionId};

/// One applied status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: TransitionId,
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub from_status: TicketStatus,
    pub to_status: TicketStatus,
    /// Who requested the change.
    pub user_id: UserId,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trait for transition audit storage backends.
///
/// Records are never updated or deleted once appended.
#[async_trait::async_trait]
pub trait TransitionAuditStore: Send + Sync {
    /// Append a record.
    async fn append(&self, record: StatusTransition) -> Result<()>;

    /// List a ticket's transitions, oldest first.
    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<StatusTransition>>;
}

/// In-memory transition audit store for testing.
#[derive(Debug, Default)]
pub struct InMemoryTransitionAuditStore {
    records: Arc<RwLock<Vec<StatusTransition>>>,
}

impl InMemoryTransitionAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait::async_trait]
impl TransitionAuditStore for InMemoryTransitionAuditStore {
    async fn append(&self, record: StatusTransition) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<StatusTransition>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}
