//! Common test utilities for itsm-sla integration tests.
//!
//! Every test gets its own in-memory stores, a manual clock pinned to a
//! Monday morning and a recording notification sink.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use itsm_core::{TenantId, UserId};
use itsm_sla::{
    EngineStores, Impact, InMemoryAlertHistoryStore, InMemoryAlertRuleStore,
    InMemoryAutomationRuleStore, InMemoryEscalationEventStore, InMemoryReminderStore,
    InMemorySlaDefinitionStore, InMemoryTicketStore, InMemoryTransitionAuditStore,
    InMemoryViolationStore, ManualClock, RecordingNotificationSink, SlaDefinition, SlaEngine,
    SlaEngineConfig, Ticket, TicketPriority,
};

/// Concrete stores, kept so tests can inspect them directly.
#[derive(Clone, Default)]
pub struct TestStores {
    pub tickets: Arc<InMemoryTicketStore>,
    pub transitions: Arc<InMemoryTransitionAuditStore>,
    pub definitions: Arc<InMemorySlaDefinitionStore>,
    pub alert_rules: Arc<InMemoryAlertRuleStore>,
    pub alert_history: Arc<InMemoryAlertHistoryStore>,
    pub violations: Arc<InMemoryViolationStore>,
    pub automation: Arc<InMemoryAutomationRuleStore>,
    pub escalation_events: Arc<InMemoryEscalationEventStore>,
    pub reminders: Arc<InMemoryReminderStore>,
}

impl TestStores {
    pub fn engine_stores(&self) -> EngineStores {
        EngineStores {
            tickets: self.tickets.clone(),
            transitions: self.transitions.clone(),
            definitions: self.definitions.clone(),
            alert_rules: self.alert_rules.clone(),
            alert_history: self.alert_history.clone(),
            violations: self.violations.clone(),
            automation: self.automation.clone(),
            escalation_events: self.escalation_events.clone(),
            reminders: self.reminders.clone(),
        }
    }
}

/// Test context containing stores, the engine and test identities.
pub struct TestContext {
    pub stores: TestStores,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingNotificationSink>,
    pub engine: Arc<SlaEngine>,
    pub tenant: TenantId,
    pub other_tenant: TenantId,
    pub agent: UserId,
}

/// Monday 2024-03-04 09:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(SlaEngineConfig::default())
    }

    pub fn with_config(config: SlaEngineConfig) -> Self {
        let stores = TestStores::default();
        let clock = Arc::new(ManualClock::new(t0()));
        let sink = Arc::new(RecordingNotificationSink::new());
        let engine = Arc::new(SlaEngine::new(
            stores.engine_stores(),
            sink.clone(),
            clock.clone(),
            config,
        ));
        Self {
            stores,
            clock,
            sink,
            engine,
            tenant: TenantId::new(),
            other_tenant: TenantId::new(),
            agent: UserId::new(),
        }
    }

    /// Move the clock to `t0 + minutes`.
    pub fn at_minute(&self, minutes: i64) {
        self.clock.set(t0() + Duration::minutes(minutes));
    }

    /// Store a 60/240 minute definition for `incident/high/high`.
    pub async fn standard_definition(&self) -> SlaDefinition {
        self.engine
            .catalog()
            .upsert(SlaDefinition::new(
                self.tenant,
                "High incident",
                "incident",
                TicketPriority::High,
                Impact::High,
                60,
                240,
            ))
            .await
            .expect("Failed to store SLA definition")
    }

    /// An unregistered `incident/high/high` ticket created now.
    pub fn incident(&self, title: &str) -> Ticket {
        Ticket::new(
            self.tenant,
            title,
            "incident",
            TicketPriority::High,
            Impact::High,
            t0(),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
