//! Legal ticket status transitions.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SlaError};
use crate::types::TicketStatus;

/// Graph of legal `from -> to` status edges. Pure validation, no side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransitionTable {
    edges: HashMap<TicketStatus, HashSet<TicketStatus>>,
}

impl StatusTransitionTable {
    /// The canonical workflow:
    ///
    /// | from          | to                                 |
    /// |---------------|------------------------------------|
    /// | `open`        | `in_progress`, `cancelled`         |
    /// | `in_progress` | `pending`, `resolved`, `cancelled` |
    /// | `pending`     | `in_progress`, `resolved`, `cancelled` |
    /// | `resolved`    | `closed`, `reopened`               |
    /// | `closed`      | `reopened`                         |
    /// | `cancelled`   | `open`                             |
    /// | `reopened`    | `in_progress`, `pending`           |
    #[must_use]
    pub fn canonical() -> Self {
        use TicketStatus::{Cancelled, Closed, InProgress, Open, Pending, Reopened, Resolved};

        Self::from_edges([
            (Open, InProgress),
            (Open, Cancelled),
            (InProgress, Pending),
            (InProgress, Resolved),
            (InProgress, Cancelled),
            (Pending, InProgress),
            (Pending, Resolved),
            (Pending, Cancelled),
            (Resolved, Closed),
            (Resolved, Reopened),
            (Closed, Reopened),
            (Cancelled, Open),
            (Reopened, InProgress),
            (Reopened, Pending),
        ])
    }

    /// Build a table from explicit edges.
    pub fn from_edges(edges: impl IntoIterator<Item = (TicketStatus, TicketStatus)>) -> Self {
        let mut map: HashMap<TicketStatus, HashSet<TicketStatus>> = HashMap::new();
        for (from, to) in edges {
            map.entry(from).or_default().insert(to);
        }
        Self { edges: map }
    }

    /// Targets reachable from `from`, in workflow order.
    #[must_use]
    pub fn allowed_from(&self, from: TicketStatus) -> Vec<TicketStatus> {
        let Some(targets) = self.edges.get(&from) else {
            return Vec::new();
        };
        TicketStatus::ALL
            .into_iter()
            .filter(|s| targets.contains(s))
            .collect()
    }

    /// Whether `from -> to` is an edge.
    #[must_use]
    pub fn is_allowed(&self, from: TicketStatus, to: TicketStatus) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// Fails with `IllegalTransition` unless `from -> to` is an edge.
    pub fn validate(&self, from: TicketStatus, to: TicketStatus) -> Result<()> {
        if self.is_allowed(from, to) {
            Ok(())
        } else {
            Err(SlaError::IllegalTransition { from, to })
        }
    }

    /// Validate raw status labels. Unknown labels fail closed with
    /// `UnknownState`.
    pub fn validate_labels(&self, from: &str, to: &str) -> Result<(TicketStatus, TicketStatus)> {
        let from: TicketStatus = from.parse()?;
        let to: TicketStatus = to.parse()?;
        self.validate(from, to)?;
        Ok((from, to))
    }

    /// Boolean form of [`Self::validate_labels`].
    #[must_use]
    pub fn validate_transition(&self, from: &str, to: &str) -> bool {
        self.validate_labels(from, to).is_ok()
    }
}

impl Default for StatusTransitionTable {
    fn default() -> Self {
        Self::canonical()
    }
}
