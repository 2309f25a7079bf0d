//! Ticket status workflow: the transition table and the tracker applying it.

pub mod table;
pub mod tracker;

pub use table::StatusTransitionTable;
pub use tracker::{TicketLifecycleTracker, TransitionOutcome};
