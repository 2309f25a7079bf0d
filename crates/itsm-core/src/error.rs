//! Error Types
//!
//! Outward-facing error type shared by ITSM crates. Domain crates keep their
//! own detailed error enums and convert into [`ItsmError`] at the boundary
//! where a request-handling layer picks a status code.
//!
//! # Example
//!
//! ```
//! use itsm_core::{ItsmError, Result};
//!
//! fn find_ticket(number: &str) -> Result<String> {
//!     if number.is_empty() {
//!         return Err(ItsmError::NotFound {
//!             resource: "Ticket".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("Ticket {number}"))
//! }
//!
//! assert!(find_ticket("").is_err());
//! ```

use crate::ids::TenantId;
use serde::Serialize;
use thiserror::Error;

/// Standardized error type for ITSM services.
///
/// # Variants
///
/// - `NotFound` - Resource not found (HTTP 404)
/// - `TenantMismatch` - Tenant isolation violation (HTTP 403)
/// - `ValidationError` - Input validation failure (HTTP 400)
/// - `Conflict` - Request conflicts with the current resource state (HTTP 409)
/// - `Internal` - Unexpected failure in a collaborator (HTTP 500)
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItsmError {
    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "Ticket")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Tenant isolation violation.
    #[error("Tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch {
        /// The expected tenant ID
        expected: TenantId,
        /// The actual tenant ID that was provided
        actual: TenantId,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// The request is well-formed but conflicts with current state, such as
    /// a status change the ticket workflow does not allow.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable description naming the conflicting states
        message: String,
    },

    /// A collaborator failed in a way the caller cannot fix.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl ItsmError {
    /// HTTP status code a transport layer should use for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::TenantMismatch { .. } => 403,
            Self::ValidationError { .. } => 400,
            Self::Conflict { .. } => 409,
            Self::Internal { .. } => 500,
        }
    }
}

/// Type alias for Results using `ItsmError`.
pub type Result<T> = std::result::Result<T, ItsmError>;
