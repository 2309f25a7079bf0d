//! Strongly Typed Identifiers
//!
//! Newtype identifiers shared by every ITSM crate. Passing a `UserId` where a
//! `TicketId` is expected does not compile.
//!
//! # Example
//!
//! ```
//! use itsm_core::{TenantId, TicketId};
//!
//! let tenant = TenantId::new();
//! let ticket = TicketId::new();
//!
//! fn requires_ticket(id: TicketId) -> String {
//!     id.to_string()
//! }
//!
//! let rendered = requires_ticket(ticket);
//! assert_eq!(rendered.len(), 36);
//! // requires_ticket(tenant); // This would not compile!
//! # let _ = tenant;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for tenants.
    ///
    /// Every ticket, rule and history row is scoped to exactly one tenant.
    ///
    /// # Example
    ///
    /// ```
    /// use itsm_core::TenantId;
    /// use uuid::Uuid;
    ///
    /// let uuid = Uuid::new_v4();
    /// let tenant_id = TenantId::from_uuid(uuid);
    /// assert_eq!(tenant_id.as_uuid(), &uuid);
    ///
    /// let parsed: TenantId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// assert_eq!(parsed.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    /// ```
    TenantId
);

define_id!(
    /// Strongly typed identifier for users (requesters, agents, managers).
    UserId
);

define_id!(
    /// Strongly typed identifier for tickets and other escalatable work items.
    TicketId
);

#[cfg(test)]
mod tests {
    use super::*;

    mod tenant_id_tests {
        use super::*;

        #[test]
        fn test_new_creates_valid_id() {
            let id = TenantId::new();
            let id_str = id.to_string();
            // UUID format: 8-4-4-4-12 hex digits
            assert_eq!(id_str.len(), 36);
            assert!(id_str.contains('-'));
        }

        #[test]
        fn test_from_uuid_preserves_value() {
            let uuid = Uuid::new_v4();
            let id = TenantId::from_uuid(uuid);
            assert_eq!(id.as_uuid(), &uuid);
            assert_eq!(Uuid::from(id), uuid);
        }

        #[test]
        fn test_default_creates_new_id() {
            assert_ne!(TenantId::default(), TenantId::default());
        }
    }

    mod ticket_id_tests {
        use super::*;

        #[test]
        fn test_display_returns_uuid_string() {
            let uuid = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
            let id = TicketId::from_uuid(uuid);
            assert_eq!(id.to_string(), "123e4567-e89b-12d3-a456-426614174000");
        }

        #[test]
        fn test_serializes_as_plain_string() {
            let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
            let id = TicketId::from_uuid(uuid);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");

            let back: TicketId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    mod from_str_tests {
        use super::*;

        #[test]
        fn test_parse_invalid_uuid_returns_error() {
            let result: std::result::Result<UserId, _> = "not-a-uuid".parse();
            let err = result.unwrap_err();
            assert_eq!(err.id_type, "UserId");
            assert!(!err.message.is_empty());
            assert!(err.to_string().contains("Failed to parse UserId"));
        }

        #[test]
        fn test_parse_empty_string_returns_error() {
            let result: std::result::Result<TicketId, _> = "".parse();
            assert_eq!(result.unwrap_err().id_type, "TicketId");
        }
    }

    mod hash_eq_tests {
        use super::*;
        use std::collections::HashMap;

        #[test]
        fn test_can_use_as_hashmap_key() {
            let mut map: HashMap<UserId, usize> = HashMap::new();
            let id1 = UserId::new();
            let id2 = UserId::new();

            map.insert(id1, 1);
            map.insert(id2, 2);

            assert_eq!(map.get(&id1), Some(&1));
            assert_eq!(map.get(&id2), Some(&2));
        }

        #[test]
        fn test_copy_semantics() {
            let id1 = TicketId::new();
            let id2 = id1;
            assert_eq!(id1, id2);
        }
    }
}
