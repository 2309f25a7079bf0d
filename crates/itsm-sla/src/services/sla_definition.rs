//! SLA definition catalog.
//!
//! Definitions are keyed by (service type, priority, impact). At most one
//! active definition may exist per key and tenant, so lookups are exact and
//! never need a precedence rule.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use itsm_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::calendar::BusinessHours;
use crate::clock::Clock;
use crate::error::{Result, SlaError};
use crate::types::{Impact, SlaDefinitionId, TicketPriority};

// ============================================================================
// Domain Types
// ============================================================================

/// Response and resolution budgets for one class of tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaDefinition {
    pub id: SlaDefinitionId,
    pub tenant_id: TenantId,
    pub name: String,
    pub service_type: String,
    pub priority: TicketPriority,
    pub impact: Impact,
    /// Business minutes allowed until first response.
    pub response_time_minutes: u32,
    /// Business minutes allowed until resolution.
    pub resolution_time_minutes: u32,
    /// Counting window. `None` uses the engine's default calendar.
    pub business_hours: Option<BusinessHours>,
    /// Dates excluded from the counting window.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    pub is_active: bool,
    /// Stamped by [`SlaCatalog::upsert`] from the engine clock.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaDefinition {
    /// Create an active definition counted on the default calendar.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        service_type: impl Into<String>,
        priority: TicketPriority,
        impact: Impact,
        response_time_minutes: u32,
        resolution_time_minutes: u32,
    ) -> Self {
        let unsaved = DateTime::default();
        Self {
            id: SlaDefinitionId::new(),
            tenant_id,
            name: name.into(),
            service_type: service_type.into(),
            priority,
            impact,
            response_time_minutes,
            resolution_time_minutes,
            business_hours: None,
            holidays: Vec::new(),
            is_active: true,
            created_at: unsaved,
            updated_at: unsaved,
        }
    }

    #[must_use]
    pub fn with_business_hours(mut self, hours: BusinessHours, holidays: Vec<NaiveDate>) -> Self {
        self.business_hours = Some(hours);
        self.holidays = holidays;
        self
    }

    /// Whether this definition governs tickets with the given key.
    #[must_use]
    pub fn matches_key(&self, service_type: &str, priority: TicketPriority, impact: Impact) -> bool {
        self.service_type == service_type && self.priority == priority && self.impact == impact
    }

    /// Check budgets and calendar configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SlaError::Validation("SLA name cannot be empty".to_string()));
        }
        if self.service_type.trim().is_empty() {
            return Err(SlaError::Validation(
                "SLA service type cannot be empty".to_string(),
            ));
        }
        if self.response_time_minutes == 0 || self.resolution_time_minutes == 0 {
            return Err(SlaError::Validation(
                "SLA time budgets must be positive".to_string(),
            ));
        }
        if self.resolution_time_minutes < self.response_time_minutes {
            return Err(SlaError::Validation(format!(
                "resolution budget ({} min) cannot be shorter than response budget ({} min)",
                self.resolution_time_minutes, self.response_time_minutes
            )));
        }
        if let Some(hours) = &self.business_hours {
            hours.validate()?;
        }
        Ok(())
    }
}

impl TenantAware for SlaDefinition {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for SLA definition storage backends.
#[async_trait::async_trait]
pub trait SlaDefinitionStore: Send + Sync {
    /// Get a definition by ID.
    async fn get(&self, tenant_id: TenantId, id: SlaDefinitionId) -> Result<Option<SlaDefinition>>;

    /// Find the active definition for a lookup key.
    async fn find_active(
        &self,
        tenant_id: TenantId,
        service_type: &str,
        priority: TicketPriority,
        impact: Impact,
    ) -> Result<Option<SlaDefinition>>;

    /// Insert or replace a definition.
    async fn upsert(&self, definition: SlaDefinition) -> Result<SlaDefinition>;

    /// List every definition of a tenant.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<SlaDefinition>>;
}

// ============================================================================
// In-Memory Store (for testing)
// ============================================================================

/// In-memory SLA definition store for testing.
#[derive(Debug, Default)]
pub struct InMemorySlaDefinitionStore {
    definitions: Arc<RwLock<HashMap<SlaDefinitionId, SlaDefinition>>>,
}

impl InMemorySlaDefinitionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SlaDefinitionStore for InMemorySlaDefinitionStore {
    async fn get(&self, tenant_id: TenantId, id: SlaDefinitionId) -> Result<Option<SlaDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .get(&id)
            .filter(|d| d.belongs_to(tenant_id))
            .cloned())
    }

    async fn find_active(
        &self,
        tenant_id: TenantId,
        service_type: &str,
        priority: TicketPriority,
        impact: Impact,
    ) -> Result<Option<SlaDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .values()
            .find(|d| {
                d.belongs_to(tenant_id) && d.is_active && d.matches_key(service_type, priority, impact)
            })
            .cloned())
    }

    async fn upsert(&self, definition: SlaDefinition) -> Result<SlaDefinition> {
        let mut definitions = self.definitions.write().await;
        if let Some(existing) = definitions.get(&definition.id) {
            if !existing.belongs_to(definition.tenant_id) {
                return Err(SlaError::TenantMismatch);
            }
        }
        definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<SlaDefinition>> {
        let definitions = self.definitions.read().await;
        let mut list: Vec<_> = definitions
            .values()
            .filter(|d| d.belongs_to(tenant_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }
}

// ============================================================================
// Catalog Service
// ============================================================================

/// Lookup and administration of SLA definitions.
pub struct SlaCatalog {
    store: Arc<dyn SlaDefinitionStore>,
    clock: Arc<dyn Clock>,
}

impl SlaCatalog {
    /// Create a new catalog.
    pub fn new(store: Arc<dyn SlaDefinitionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Find the active definition governing a key.
    ///
    /// `Ok(None)` means no SLA governs such tickets; it is not an error.
    #[instrument(skip(self))]
    pub async fn find_applicable(
        &self,
        tenant_id: TenantId,
        service_type: &str,
        priority: TicketPriority,
        impact: Impact,
    ) -> Result<Option<SlaDefinition>> {
        let found = self
            .store
            .find_active(tenant_id, service_type, priority, impact)
            .await?;
        if found.is_none() {
            debug!("No applicable SLA definition");
        }
        Ok(found)
    }

    /// Get a definition by ID.
    pub async fn get(&self, tenant_id: TenantId, id: SlaDefinitionId) -> Result<SlaDefinition> {
        self.store
            .get(tenant_id, id)
            .await?
            .ok_or(SlaError::SlaDefinitionNotFound(id))
    }

    /// Create or update a definition after validation.
    ///
    /// An active definition may not share its key with another active one.
    #[instrument(skip(self, definition), fields(sla_definition_id = %definition.id))]
    pub async fn upsert(&self, mut definition: SlaDefinition) -> Result<SlaDefinition> {
        definition.validate()?;

        if definition.is_active {
            if let Some(clash) = self
                .store
                .find_active(
                    definition.tenant_id,
                    &definition.service_type,
                    definition.priority,
                    definition.impact,
                )
                .await?
            {
                if clash.id != definition.id {
                    return Err(SlaError::Validation(format!(
                        "an active SLA definition ({}) already covers {}/{}/{}",
                        clash.id, definition.service_type, definition.priority, definition.impact
                    )));
                }
            }
        }

        let now = self.clock.now();
        if let Some(existing) = self.store.get(definition.tenant_id, definition.id).await? {
            definition.created_at = existing.created_at;
        } else {
            definition.created_at = now;
        }
        definition.updated_at = now;

        let saved = self.store.upsert(definition).await?;
        info!(
            sla_definition_id = %saved.id,
            service_type = %saved.service_type,
            priority = %saved.priority,
            impact = %saved.impact,
            "SLA definition saved"
        );
        Ok(saved)
    }

    /// Stop matching new tickets against a definition.
    #[instrument(skip(self))]
    pub async fn deactivate(
        &self,
        tenant_id: TenantId,
        id: SlaDefinitionId,
    ) -> Result<SlaDefinition> {
        let mut definition = self.get(tenant_id, id).await?;
        definition.is_active = false;
        definition.updated_at = self.clock.now();
        let saved = self.store.upsert(definition).await?;
        info!(sla_definition_id = %id, "SLA definition deactivated");
        Ok(saved)
    }

    /// List every definition of a tenant, sorted by name.
    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<SlaDefinition>> {
        self.store.list(tenant_id).await
    }
}
