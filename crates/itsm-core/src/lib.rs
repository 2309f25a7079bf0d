//! ITSM Core Library
//!
//! Shared types and traits for the ITSM backend crates.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (TenantId, UserId, TicketId)
//! - [`traits`] - Multi-tenant traits (TenantAware)
//! - [`error`] - Outward-facing error type (ItsmError)
//!
//! # Example
//!
//! ```
//! use itsm_core::{ItsmError, Result, TenantId, TicketId};
//!
//! let tenant_id = TenantId::new();
//! let ticket_id = TicketId::new();
//!
//! fn example(ticket_id: TicketId) -> Result<()> {
//!     Err(ItsmError::NotFound {
//!         resource: "Ticket".to_string(),
//!         id: Some(ticket_id.to_string()),
//!     })
//! }
//!
//! assert!(example(ticket_id).is_err());
//! # let _ = tenant_id;
//! ```

pub mod error;
pub mod ids;
pub mod traits;

pub use error::{ItsmError, Result};
pub use ids::{ParseIdError, TenantId, TicketId, UserId};
pub use traits::TenantAware;
