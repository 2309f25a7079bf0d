//! Escalation Job.
//!
//! Runs the automatic escalation sweep and the long-pending and unassigned
//! reminders for one tenant. The scheduler drives it periodically (default:
//! every 5 minutes).

use std::sync::Arc;

use itsm_core::TenantId;
use tracing::{debug, error, info, instrument};

use crate::engine::SlaEngine;
use crate::error::SlaError;
use crate::services::{EscalationSweepStats, ReminderStats};

/// Default polling interval in seconds (5 minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Job for processing automatic escalations.
pub struct EscalationJob {
    engine: Arc<SlaEngine>,
}

/// Statistics from one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationPollStats {
    pub sweep: EscalationSweepStats,
    pub reminders: ReminderStats,
}

impl EscalationPollStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &EscalationPollStats) {
        self.sweep.merge(&other.sweep);
        self.reminders.merge(&other.reminders);
    }
}

/// Errors that abort a whole escalation poll.
#[derive(Debug, thiserror::Error)]
pub enum EscalationJobError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl From<SlaError> for EscalationJobError {
    fn from(err: SlaError) -> Self {
        match err {
            SlaError::Persistence(message) => Self::Store(message),
            other => Self::Processing(other.to_string()),
        }
    }
}

impl EscalationJob {
    /// Create a new escalation job.
    #[must_use]
    pub fn new(engine: Arc<SlaEngine>) -> Self {
        Self { engine }
    }

    /// Run a single poll cycle for a tenant.
    ///
    /// Per-ticket failures are counted in the stats; only failures to load
    /// the work list, the rules or the open reminders abort the cycle.
    #[instrument(skip(self))]
    pub async fn poll(&self, tenant_id: TenantId) -> Result<EscalationPollStats, EscalationJobError> {
        let sweep = self
            .engine
            .run_escalation_sweep(tenant_id)
            .await
            .map_err(|e| {
                error!(tenant_id = %tenant_id, error = %e, "Escalation sweep failed");
                EscalationJobError::from(e)
            })?;

        let reminders = self.engine.run_reminders(tenant_id).await.map_err(|e| {
            error!(tenant_id = %tenant_id, error = %e, "Reminder pass failed");
            EscalationJobError::from(e)
        })?;

        let stats = EscalationPollStats { sweep, reminders };
        let sent = stats.reminders.long_pending + stats.reminders.unassigned;
        let failed = stats.sweep.failed + stats.reminders.failed;
        if stats.sweep.escalated > 0 || sent > 0 || failed > 0 {
            info!(
                tenant_id = %tenant_id,
                processed = stats.sweep.processed,
                escalated = stats.sweep.escalated,
                reminders = sent,
                failed = failed,
                "Completed escalation poll cycle"
            );
        } else {
            debug!(tenant_id = %tenant_id, "No escalations to process");
        }

        Ok(stats)
    }
}
