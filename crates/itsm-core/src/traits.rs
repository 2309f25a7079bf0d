//! Multi-Tenant Traits
//!
//! Tickets, SLA definitions and alert rules all belong to one tenant. The
//! [`TenantAware`] trait lets generic code verify that an entity loaded for
//! one tenant is never acted upon on behalf of another.
//!
//! # Example
//!
//! ```
//! use itsm_core::{TenantAware, TenantId};
//!
//! struct Ticket {
//!     tenant_id: TenantId,
//!     title: String,
//! }
//!
//! impl TenantAware for Ticket {
//!     fn tenant_id(&self) -> TenantId {
//!         self.tenant_id
//!     }
//! }
//!
//! let tenant = TenantId::new();
//! let ticket = Ticket { tenant_id: tenant, title: "Printer on fire".into() };
//! assert!(ticket.belongs_to(tenant));
//! ```

use crate::error::ItsmError;
use crate::ids::TenantId;

/// Trait for entities that belong to a specific tenant.
///
/// This trait is object-safe and can be used as `&dyn TenantAware`.
pub trait TenantAware {
    /// Returns the tenant ID associated with this entity.
    fn tenant_id(&self) -> TenantId;

    /// Whether this entity belongs to `tenant`.
    fn belongs_to(&self, tenant: TenantId) -> bool {
        self.tenant_id() == tenant
    }

    /// Fails with [`ItsmError::TenantMismatch`] when the entity belongs to
    /// another tenant.
    fn ensure_tenant(&self, expected: TenantId) -> Result<(), ItsmError> {
        let actual = self.tenant_id();
        if actual == expected {
            Ok(())
        } else {
            Err(ItsmError::TenantMismatch { expected, actual })
        }
    }
}
