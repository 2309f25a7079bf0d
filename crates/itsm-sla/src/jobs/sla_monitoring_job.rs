//! SLA Monitoring Job.
//!
//! Checks every active ticket of a tenant for violations, threshold alerts
//! and alert escalations. Runs periodically (default: every minute).

use std::sync::Arc;

use itsm_core::TenantId;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::SlaEngine;
use crate::error::SlaError;

/// Default polling interval in seconds (1 minute).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Job for monitoring SLA compliance of active tickets.
pub struct SlaMonitoringJob {
    engine: Arc<SlaEngine>,
}

/// Statistics from one monitoring poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlaMonitoringStats {
    /// Tickets checked.
    pub checked: usize,
    /// Violations recorded.
    pub violations_recorded: usize,
    /// Alerts raised.
    pub alerts_raised: usize,
    /// Alerts resolved because their condition cleared.
    pub alerts_resolved: usize,
    /// Alerts raised to a higher escalation level.
    pub alerts_escalated: usize,
    /// Tickets whose check failed.
    pub failed: usize,
}

impl SlaMonitoringStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &SlaMonitoringStats) {
        self.checked += other.checked;
        self.violations_recorded += other.violations_recorded;
        self.alerts_raised += other.alerts_raised;
        self.alerts_resolved += other.alerts_resolved;
        self.alerts_escalated += other.alerts_escalated;
        self.failed += other.failed;
    }
}

/// Errors that abort a whole monitoring poll.
#[derive(Debug, thiserror::Error)]
pub enum SlaMonitoringJobError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Service error: {0}")]
    Service(String),
}

impl From<SlaError> for SlaMonitoringJobError {
    fn from(err: SlaError) -> Self {
        match err {
            SlaError::Persistence(message) => Self::Store(message),
            other => Self::Service(other.to_string()),
        }
    }
}

impl SlaMonitoringJob {
    /// Create a new SLA monitoring job.
    #[must_use]
    pub fn new(engine: Arc<SlaEngine>) -> Self {
        Self { engine }
    }

    /// Run a single poll cycle for a tenant.
    #[instrument(skip(self))]
    pub async fn poll(
        &self,
        tenant_id: TenantId,
    ) -> Result<SlaMonitoringStats, SlaMonitoringJobError> {
        let tickets = self.engine.active_tickets(tenant_id).await.map_err(|e| {
            error!(tenant_id = %tenant_id, error = %e, "Failed to load active tickets");
            SlaMonitoringJobError::from(e)
        })?;

        let mut stats = SlaMonitoringStats::default();
        for ticket in &tickets {
            stats.checked += 1;
            match self.engine.monitor_ticket(ticket).await {
                Ok(report) => {
                    let ticket_stats = SlaMonitoringStats {
                        violations_recorded: report.violations.len(),
                        alerts_raised: report.alerts.created.len(),
                        alerts_resolved: report.alerts.resolved,
                        alerts_escalated: report.alerts.escalated,
                        ..Default::default()
                    };
                    stats.merge(&ticket_stats);
                }
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "Failed to check ticket SLA");
                    stats.failed += 1;
                }
            }
        }

        if stats.violations_recorded + stats.alerts_raised + stats.alerts_escalated + stats.failed
            > 0
        {
            info!(
                tenant_id = %tenant_id,
                checked = stats.checked,
                violations_recorded = stats.violations_recorded,
                alerts_raised = stats.alerts_raised,
                alerts_resolved = stats.alerts_resolved,
                alerts_escalated = stats.alerts_escalated,
                failed = stats.failed,
                "SLA monitoring poll cycle complete"
            );
        } else {
            debug!(tenant_id = %tenant_id, checked = stats.checked, "SLA monitoring found nothing new");
        }

        Ok(stats)
    }
}
