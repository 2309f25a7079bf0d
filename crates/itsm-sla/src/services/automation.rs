//! Automation rule configuration: assignment rules, escalation rules and the
//! assignee groups both of them route to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itsm_core::{TenantAware, TenantId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SlaError};
use crate::ticket::Ticket;
use crate::types::{AssignmentRuleId, EscalationRuleId, TicketPriority};

// ============================================================================
// Conditions
// ============================================================================

/// Attribute predicate of an automation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Priority(TicketPriority),
    TicketType(String),
    Category(String),
    /// Free-form ticket attribute equality.
    Attribute { name: String, value: String },
}

impl Condition {
    /// Whether `ticket` satisfies this predicate. Missing attributes never match.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Self::Priority(priority) => ticket.priority == *priority,
            Self::TicketType(ticket_type) => ticket.service_type == *ticket_type,
            Self::Category(category) => ticket.category.as_deref() == Some(category.as_str()),
            Self::Attribute { name, value } => {
                ticket.attribute(name).as_deref() == Some(value.as_str())
            }
        }
    }
}

// ============================================================================
// Assignees and Groups
// ============================================================================

/// How a group picks one of its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategyKind {
    #[default]
    RoundRobin,
    LeastBusy,
    SkillBased,
}

impl fmt::Display for AssignmentStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::LeastBusy => write!(f, "least_busy"),
            Self::SkillBased => write!(f, "skill_based"),
        }
    }
}

/// A roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub user_id: UserId,
    /// Skill tags matched by the skill-based strategy.
    #[serde(default)]
    pub skills: Vec<String>,
}

impl Assignee {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            skills: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }
}

/// Named roster of assignees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentGroup {
    pub tenant_id: TenantId,
    pub name: String,
    pub members: Vec<Assignee>,
}

impl TenantAware for AssignmentGroup {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Rule selecting an assignee for new or unassigned tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignmentRule {
    pub id: AssignmentRuleId,
    pub tenant_id: TenantId,
    pub name: String,
    /// All conditions must hold. An empty list matches every ticket.
    pub conditions: Vec<Condition>,
    pub group: String,
    pub strategy: AssignmentStrategyKind,
    /// Lower values are evaluated first.
    pub priority_order: i32,
    pub is_active: bool,
    /// Stamped by [`WorkflowAutomationRouter::upsert_rule`] on first save.
    ///
    /// [`WorkflowAutomationRouter::upsert_rule`]: crate::services::router::WorkflowAutomationRouter::upsert_rule
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl AutoAssignmentRule {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        conditions: Vec<Condition>,
        group: impl Into<String>,
        strategy: AssignmentStrategyKind,
        priority_order: i32,
    ) -> Self {
        Self {
            id: AssignmentRuleId::new(),
            tenant_id,
            name: name.into(),
            conditions,
            group: group.into(),
            strategy,
            priority_order,
            is_active: true,
            created_at: DateTime::default(),
        }
    }

    /// Sort key: ascending `priority_order`, ties broken by creation time.
    #[must_use]
    pub fn evaluation_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority_order, self.created_at)
    }
}

/// Who an escalation hands the ticket to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationTarget {
    /// A specific user.
    User { user_id: UserId },
    /// A member of a group, picked with the given strategy.
    Group {
        name: String,
        #[serde(default)]
        strategy: AssignmentStrategyKind,
    },
}

impl fmt::Display for EscalationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { user_id } => write!(f, "user:{user_id}"),
            Self::Group { name, strategy } => write!(f, "group:{name} ({strategy})"),
        }
    }
}

/// Time-limit rule for the periodic escalation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoEscalationRule {
    pub id: EscalationRuleId,
    pub tenant_id: TenantId,
    pub name: String,
    /// All conditions must hold. An empty list matches every ticket.
    pub conditions: Vec<Condition>,
    pub escalate_to: EscalationTarget,
    /// Wall-clock minutes since creation after which the rule applies.
    pub time_limit_minutes: u32,
    /// Lower values are evaluated first; the first match wins.
    pub priority_order: i32,
    pub is_active: bool,
    /// Stamped by [`EscalationService::upsert_rule`] on first save.
    ///
    /// [`EscalationService::upsert_rule`]: crate::services::escalation::EscalationService::upsert_rule
    pub created_at: DateTime<Utc>,
}

impl AutoEscalationRule {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        conditions: Vec<Condition>,
        escalate_to: EscalationTarget,
        time_limit_minutes: u32,
        priority_order: i32,
    ) -> Self {
        Self {
            id: EscalationRuleId::new(),
            tenant_id,
            name: name.into(),
            conditions,
            escalate_to,
            time_limit_minutes,
            priority_order,
            is_active: true,
            created_at: DateTime::default(),
        }
    }

    /// Sort key: ascending `priority_order`, ties broken by creation time.
    #[must_use]
    pub fn evaluation_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority_order, self.created_at)
    }

    /// Whether the rule fires for `ticket` at `now`.
    #[must_use]
    pub fn applies(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        self.is_active
            && now - ticket.created_at > chrono::Duration::minutes(i64::from(self.time_limit_minutes))
            && self.conditions.iter().all(|c| c.matches(ticket))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SlaError::Validation(
                "escalation rule name cannot be empty".to_string(),
            ));
        }
        if let EscalationTarget::Group { name, .. } = &self.escalate_to {
            if name.trim().is_empty() {
                return Err(SlaError::Validation(
                    "escalation target group cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl TenantAware for AutoEscalationRule {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for automation configuration storage backends.
///
/// Rule listings come back in evaluation order. Rules with equal
/// [`evaluation_key`](AutoEscalationRule::evaluation_key) keep the order in
/// which they were first stored.
#[async_trait::async_trait]
pub trait AutomationRuleStore: Send + Sync {
    async fn upsert_assignment_rule(&self, rule: AutoAssignmentRule) -> Result<AutoAssignmentRule>;

    async fn get_assignment_rule(
        &self,
        tenant_id: TenantId,
        id: AssignmentRuleId,
    ) -> Result<Option<AutoAssignmentRule>>;

    async fn list_assignment_rules(&self, tenant_id: TenantId) -> Result<Vec<AutoAssignmentRule>>;

    async fn upsert_escalation_rule(&self, rule: AutoEscalationRule) -> Result<AutoEscalationRule>;

    async fn get_escalation_rule(
        &self,
        tenant_id: TenantId,
        id: EscalationRuleId,
    ) -> Result<Option<AutoEscalationRule>>;

    async fn list_escalation_rules(&self, tenant_id: TenantId) -> Result<Vec<AutoEscalationRule>>;

    async fn upsert_group(&self, group: AssignmentGroup) -> Result<AssignmentGroup>;

    async fn get_group(&self, tenant_id: TenantId, name: &str) -> Result<Option<AssignmentGroup>>;
}

// ============================================================================
// In-Memory Store (for testing)
// ============================================================================

/// In-memory automation configuration store for testing.
///
/// Rules are kept in insertion order; an update replaces the rule in place.
#[derive(Debug, Default)]
pub struct InMemoryAutomationRuleStore {
    assignment_rules: Arc<RwLock<Vec<AutoAssignmentRule>>>,
    escalation_rules: Arc<RwLock<Vec<AutoEscalationRule>>>,
    groups: Arc<RwLock<HashMap<(TenantId, String), AssignmentGroup>>>,
}

impl InMemoryAutomationRuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_in_place<T: Clone, K: PartialEq>(rules: &mut Vec<T>, rule: &T, key: impl Fn(&T) -> K) {
    match rules.iter_mut().find(|r| key(r) == key(rule)) {
        Some(slot) => *slot = rule.clone(),
        None => rules.push(rule.clone()),
    }
}

#[async_trait::async_trait]
impl AutomationRuleStore for InMemoryAutomationRuleStore {
    async fn upsert_assignment_rule(&self, rule: AutoAssignmentRule) -> Result<AutoAssignmentRule> {
        let mut rules = self.assignment_rules.write().await;
        upsert_in_place(&mut *rules, &rule, |r| r.id);
        Ok(rule)
    }

    async fn get_assignment_rule(
        &self,
        tenant_id: TenantId,
        id: AssignmentRuleId,
    ) -> Result<Option<AutoAssignmentRule>> {
        let rules = self.assignment_rules.read().await;
        Ok(rules
            .iter()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_assignment_rules(&self, tenant_id: TenantId) -> Result<Vec<AutoAssignmentRule>> {
        let rules = self.assignment_rules.read().await;
        let mut list: Vec<_> = rules
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by_key(AutoAssignmentRule::evaluation_key);
        Ok(list)
    }

    async fn upsert_escalation_rule(&self, rule: AutoEscalationRule) -> Result<AutoEscalationRule> {
        let mut rules = self.escalation_rules.write().await;
        upsert_in_place(&mut *rules, &rule, |r| r.id);
        Ok(rule)
    }

    async fn get_escalation_rule(
        &self,
        tenant_id: TenantId,
        id: EscalationRuleId,
    ) -> Result<Option<AutoEscalationRule>> {
        let rules = self.escalation_rules.read().await;
        Ok(rules
            .iter()
            .find(|r| r.id == id && r.belongs_to(tenant_id))
            .cloned())
    }

    async fn list_escalation_rules(&self, tenant_id: TenantId) -> Result<Vec<AutoEscalationRule>> {
        let rules = self.escalation_rules.read().await;
        let mut list: Vec<_> = rules
            .iter()
            .filter(|r| r.belongs_to(tenant_id))
            .cloned()
            .collect();
        list.sort_by_key(AutoEscalationRule::evaluation_key);
        Ok(list)
    }

    async fn upsert_group(&self, group: AssignmentGroup) -> Result<AssignmentGroup> {
        self.groups
            .write()
            .await
            .insert((group.tenant_id, group.name.clone()), group.clone());
        Ok(group)
    }

    async fn get_group(&self, tenant_id: TenantId, name: &str) -> Result<Option<AssignmentGroup>> {
        let groups = self.groups.read().await;
        Ok(groups.get(&(tenant_id, name.to_string())).cloned())
    }
}
