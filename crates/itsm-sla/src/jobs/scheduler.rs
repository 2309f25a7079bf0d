//! Per-tenant scheduler for the background jobs.
//!
//! The scheduler is an explicit object owned by the host application: it is
//! started per tenant and stopped with [`SlaScheduler::shutdown`]. A pass
//! that is already running when shutdown is requested finishes before its
//! loop exits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use itsm_core::TenantId;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SlaEngine;
use crate::jobs::escalation_job::EscalationJob;
use crate::jobs::sla_monitoring_job::SlaMonitoringJob;

/// Owns the escalation and monitoring loops of every started tenant.
pub struct SlaScheduler {
    escalation_job: Arc<EscalationJob>,
    monitoring_job: Arc<SlaMonitoringJob>,
    escalation_interval: Duration,
    monitoring_interval: Duration,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SlaScheduler {
    /// Create a scheduler using the engine's configured intervals.
    #[must_use]
    pub fn new(engine: Arc<SlaEngine>) -> Self {
        let escalation_interval = engine.config().escalation_interval;
        let monitoring_interval = engine.config().sla_monitor_interval;
        Self {
            escalation_job: Arc::new(EscalationJob::new(Arc::clone(&engine))),
            monitoring_job: Arc::new(SlaMonitoringJob::new(engine)),
            escalation_interval,
            monitoring_interval,
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Override both periods.
    #[must_use]
    pub fn with_intervals(mut self, escalation: Duration, monitoring: Duration) -> Self {
        self.escalation_interval = escalation.max(Duration::from_millis(1));
        self.monitoring_interval = monitoring.max(Duration::from_millis(1));
        self
    }

    /// Token cancelled on shutdown. Cancelling it stops every loop.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Number of running loops.
    #[must_use]
    pub fn running_loops(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Start the escalation and monitoring loops for a tenant.
    pub fn start_tenant(&mut self, tenant_id: TenantId) {
        let escalation_job = Arc::clone(&self.escalation_job);
        self.handles.push(spawn_loop(
            "escalation",
            tenant_id,
            self.escalation_interval,
            self.token.child_token(),
            move || {
                let job = Arc::clone(&escalation_job);
                async move {
                    if let Err(e) = job.poll(tenant_id).await {
                        warn!(tenant_id = %tenant_id, error = %e, "Escalation poll failed");
                    }
                }
            },
        ));

        let monitoring_job = Arc::clone(&self.monitoring_job);
        self.handles.push(spawn_loop(
            "sla_monitoring",
            tenant_id,
            self.monitoring_interval,
            self.token.child_token(),
            move || {
                let job = Arc::clone(&monitoring_job);
                async move {
                    if let Err(e) = job.poll(tenant_id).await {
                        warn!(tenant_id = %tenant_id, error = %e, "SLA monitoring poll failed");
                    }
                }
            },
        ));

        info!(
            tenant_id = %tenant_id,
            escalation_interval_secs = self.escalation_interval.as_secs(),
            monitoring_interval_secs = self.monitoring_interval.as_secs(),
            "SLA scheduler started for tenant"
        );
    }

    /// Stop every loop and wait for in-flight passes to finish.
    pub async fn shutdown(self) {
        info!(loops = self.handles.len(), "SLA scheduler shutdown requested");
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "SLA scheduler loop ended abnormally");
            }
        }
        info!("SLA scheduler stopped");
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    tenant_id: TenantId,
    period: Duration,
    token: CancellationToken,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(job = name, tenant_id = %tenant_id, "Loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    pass().await;
                }
            }
        }
    })
}
