//! Workflow automation router.
//!
//! Matches tickets against rule conditions and picks assignees from groups.
//! Used for initial auto-assignment and for escalation target selection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use itsm_core::{TenantId, UserId};
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::error::{Result, SlaError};
use crate::services::automation::{
    Assignee, AssignmentGroup, AssignmentStrategyKind, AutoAssignmentRule, AutomationRuleStore,
    Condition, EscalationTarget,
};
use crate::ticket::{Ticket, TicketStore};

// ============================================================================
// Strategies
// ============================================================================

/// Picks one member of a roster for a ticket.
#[async_trait::async_trait]
pub trait AssignmentStrategy: Send + Sync {
    async fn select(
        &self,
        group: &AssignmentGroup,
        ticket: &Ticket,
    ) -> Result<Option<UserId>>;
}

/// Rotates through the roster, one cursor per group.
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    cursors: Mutex<HashMap<(TenantId, String), usize>>,
}

#[async_trait::async_trait]
impl AssignmentStrategy for RoundRobinStrategy {
    async fn select(&self, group: &AssignmentGroup, _ticket: &Ticket) -> Result<Option<UserId>> {
        if group.members.is_empty() {
            return Ok(None);
        }
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let cursor = cursors
            .entry((group.tenant_id, group.name.clone()))
            .or_insert(0);
        let picked = group.members[*cursor % group.members.len()].user_id;
        *cursor = (*cursor + 1) % group.members.len();
        Ok(Some(picked))
    }
}

/// Picks the member with the fewest active tickets. Ties go to roster order.
pub struct LeastBusyStrategy {
    tickets: Arc<dyn TicketStore>,
}

impl LeastBusyStrategy {
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }
}

#[async_trait::async_trait]
impl AssignmentStrategy for LeastBusyStrategy {
    async fn select(&self, group: &AssignmentGroup, _ticket: &Ticket) -> Result<Option<UserId>> {
        let mut best: Option<(usize, UserId)> = None;
        for member in &group.members {
            let load = self
                .tickets
                .count_open_by_assignee(group.tenant_id, member.user_id)
                .await?;
            if best.map_or(true, |(lowest, _)| load < lowest) {
                best = Some((load, member.user_id));
            }
        }
        Ok(best.map(|(_, user)| user))
    }
}

/// Picks the member whose skills overlap most with the ticket's type,
/// category and attribute values. Nobody is picked without an overlap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkillBasedStrategy;

impl SkillBasedStrategy {
    fn score(assignee: &Assignee, ticket: &Ticket) -> usize {
        let mut tags: Vec<String> = vec![ticket.service_type.to_lowercase()];
        if let Some(category) = &ticket.category {
            tags.push(category.to_lowercase());
        }
        tags.extend(ticket.attributes.values().map(|v| v.to_lowercase()));

        assignee
            .skills
            .iter()
            .filter(|skill| tags.contains(&skill.to_lowercase()))
            .count()
    }
}

#[async_trait::async_trait]
impl AssignmentStrategy for SkillBasedStrategy {
    async fn select(&self, group: &AssignmentGroup, ticket: &Ticket) -> Result<Option<UserId>> {
        let mut best: Option<(usize, UserId)> = None;
        for member in &group.members {
            let score = Self::score(member, ticket);
            if score > 0 && best.map_or(true, |(top, _)| score > top) {
                best = Some((score, member.user_id));
            }
        }
        Ok(best.map(|(_, user)| user))
    }
}

// ============================================================================
// Router
// ============================================================================

/// Condition matcher and assignee selector.
pub struct WorkflowAutomationRouter {
    rules: Arc<dyn AutomationRuleStore>,
    round_robin: RoundRobinStrategy,
    least_busy: LeastBusyStrategy,
    skill_based: SkillBasedStrategy,
    default_assignee: Option<UserId>,
    clock: Arc<dyn Clock>,
}

impl WorkflowAutomationRouter {
    pub fn new(
        rules: Arc<dyn AutomationRuleStore>,
        tickets: Arc<dyn TicketStore>,
        default_assignee: Option<UserId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rules,
            round_robin: RoundRobinStrategy::default(),
            least_busy: LeastBusyStrategy::new(tickets),
            skill_based: SkillBasedStrategy,
            default_assignee,
            clock,
        }
    }

    /// Create or update an assignment rule. The creation time is kept across
    /// updates.
    pub async fn upsert_rule(&self, mut rule: AutoAssignmentRule) -> Result<AutoAssignmentRule> {
        if rule.group.trim().is_empty() {
            return Err(SlaError::Validation(
                "assignment rule group cannot be empty".to_string(),
            ));
        }
        rule.created_at = match self.rules.get_assignment_rule(rule.tenant_id, rule.id).await? {
            Some(existing) => existing.created_at,
            None => self.clock.now(),
        };
        let saved = self.rules.upsert_assignment_rule(rule).await?;
        info!(
            rule_id = %saved.id,
            priority_order = saved.priority_order,
            group = %saved.group,
            "Assignment rule saved"
        );
        Ok(saved)
    }

    pub async fn upsert_group(&self, group: AssignmentGroup) -> Result<AssignmentGroup> {
        self.rules.upsert_group(group).await
    }

    /// Conjunction of equality checks. An empty list matches.
    #[must_use]
    pub fn matches(ticket: &Ticket, conditions: &[Condition]) -> bool {
        conditions.iter().all(|c| c.matches(ticket))
    }

    fn strategy(&self, kind: AssignmentStrategyKind) -> &dyn AssignmentStrategy {
        match kind {
            AssignmentStrategyKind::RoundRobin => &self.round_robin,
            AssignmentStrategyKind::LeastBusy => &self.least_busy,
            AssignmentStrategyKind::SkillBased => &self.skill_based,
        }
    }

    /// Pick a member of `group_name` with the given strategy.
    pub async fn select_assignee(
        &self,
        tenant_id: TenantId,
        group_name: &str,
        strategy: AssignmentStrategyKind,
        ticket: &Ticket,
    ) -> Result<Option<UserId>> {
        let Some(group) = self.rules.get_group(tenant_id, group_name).await? else {
            debug!(group = group_name, "Assignment group not found");
            return Ok(None);
        };
        self.strategy(strategy).select(&group, ticket).await
    }

    /// Choose an assignee for an unassigned ticket.
    ///
    /// Active rules are tried in ascending `priority_order`, ties in creation
    /// order; the first rule that matches and yields a member wins. Falls
    /// back to the configured default assignee.
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    pub async fn auto_assign(&self, ticket: &Ticket) -> Result<Option<UserId>> {
        let mut rules: Vec<AutoAssignmentRule> = self
            .rules
            .list_assignment_rules(ticket.tenant_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active)
            .collect();
        rules.sort_by_key(AutoAssignmentRule::evaluation_key);

        for rule in rules.iter().filter(|r| Self::matches(ticket, &r.conditions)) {
            if let Some(user) = self
                .select_assignee(ticket.tenant_id, &rule.group, rule.strategy, ticket)
                .await?
            {
                info!(
                    ticket_id = %ticket.id,
                    rule = %rule.name,
                    strategy = %rule.strategy,
                    assignee = %user,
                    "Assignment rule selected assignee"
                );
                return Ok(Some(user));
            }
        }

        if let Some(user) = self.default_assignee {
            debug!(assignee = %user, "No assignment rule applied, using default assignee");
        }
        Ok(self.default_assignee)
    }

    /// Resolve an escalation target to a user.
    pub async fn resolve_target(
        &self,
        tenant_id: TenantId,
        target: &EscalationTarget,
        ticket: &Ticket,
    ) -> Result<UserId> {
        match target {
            EscalationTarget::User { user_id } => Ok(*user_id),
            EscalationTarget::Group { name, strategy } => self
                .select_assignee(tenant_id, name, *strategy, ticket)
                .await?
                .ok_or_else(|| {
                    SlaError::Validation(format!("escalation target {target} has no eligible member"))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::clock::ManualClock;
    use crate::services::automation::InMemoryAutomationRuleStore;
    use crate::ticket::InMemoryTicketStore;
    use crate::types::{Impact, TicketPriority, TicketStatus};

    struct Fixture {
        router: WorkflowAutomationRouter,
        rules: Arc<InMemoryAutomationRuleStore>,
        tickets: Arc<InMemoryTicketStore>,
        tenant: TenantId,
        alice: UserId,
        bob: UserId,
    }

    async fn fixture(default_assignee: Option<UserId>) -> Fixture {
        let rules = Arc::new(InMemoryAutomationRuleStore::new());
        let tickets = Arc::new(InMemoryTicketStore::new());
        let tenant = TenantId::new();
        let alice = UserId::new();
        let bob = UserId::new();
        rules
            .upsert_group(AssignmentGroup {
                tenant_id: tenant,
                name: "desk".to_string(),
                members: vec![
                    Assignee::new(alice).with_skills(["printer"]),
                    Assignee::new(bob).with_skills(["network", "vpn"]),
                ],
            })
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()));
        let router = WorkflowAutomationRouter::new(
            rules.clone(),
            tickets.clone(),
            default_assignee,
            clock,
        );
        Fixture {
            router,
            rules,
            tickets,
            tenant,
            alice,
            bob,
        }
    }

    fn ticket(tenant: TenantId, service_type: &str) -> Ticket {
        Ticket::new(
            tenant,
            "Help",
            service_type,
            TicketPriority::Medium,
            Impact::Medium,
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_round_robin_rotates() {
        let f = fixture(None).await;
        let t = ticket(f.tenant, "network");
        let mut picks = Vec::new();
        for _ in 0..3 {
            picks.push(
                f.router
                    .select_assignee(f.tenant, "desk", AssignmentStrategyKind::RoundRobin, &t)
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert_eq!(picks, vec![f.alice, f.bob, f.alice]);
    }

    #[tokio::test]
    async fn test_least_busy_prefers_lighter_load() {
        let f = fixture(None).await;
        f.tickets
            .insert(ticket(f.tenant, "printer").with_assignee(f.alice))
            .await
            .unwrap();

        let picked = f
            .router
            .select_assignee(
                f.tenant,
                "desk",
                AssignmentStrategyKind::LeastBusy,
                &ticket(f.tenant, "x"),
            )
            .await
            .unwrap();
        assert_eq!(picked, Some(f.bob));

        // Closed tickets do not count as load.
        let mut done = ticket(f.tenant, "printer").with_assignee(f.bob);
        done.status = TicketStatus::Closed;
        f.tickets.insert(done).await.unwrap();
        let picked = f
            .router
            .select_assignee(
                f.tenant,
                "desk",
                AssignmentStrategyKind::LeastBusy,
                &ticket(f.tenant, "x"),
            )
            .await
            .unwrap();
        assert_eq!(picked, Some(f.bob));
    }

    #[tokio::test]
    async fn test_skill_based_matches_tags() {
        let f = fixture(None).await;
        let vpn = ticket(f.tenant, "Network");
        assert_eq!(
            f.router
                .select_assignee(f.tenant, "desk", AssignmentStrategyKind::SkillBased, &vpn)
                .await
                .unwrap(),
            Some(f.bob)
        );

        let unknown = ticket(f.tenant, "payroll");
        assert_eq!(
            f.router
                .select_assignee(f.tenant, "desk", AssignmentStrategyKind::SkillBased, &unknown)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_auto_assign_first_matching_rule_then_default() {
        let fallback = UserId::new();
        let f = fixture(Some(fallback)).await;
        f.router
            .upsert_rule(AutoAssignmentRule::new(
                f.tenant,
                "network to skilled",
                vec![Condition::TicketType("network".into())],
                "desk",
                AssignmentStrategyKind::SkillBased,
                1,
            ))
            .await
            .unwrap();

        let network = ticket(f.tenant, "network");
        assert_eq!(f.router.auto_assign(&network).await.unwrap(), Some(f.bob));

        let other = ticket(f.tenant, "facilities");
        assert_eq!(f.router.auto_assign(&other).await.unwrap(), Some(fallback));
    }

    #[tokio::test]
    async fn test_tied_rules_prefer_first_created() {
        let f = fixture(None).await;
        f.rules
            .upsert_group(AssignmentGroup {
                tenant_id: f.tenant,
                name: "night".to_string(),
                members: vec![Assignee::new(f.bob)],
            })
            .await
            .unwrap();
        for group in ["night", "desk"] {
            let saved = f
                .router
                .upsert_rule(AutoAssignmentRule::new(
                    f.tenant,
                    format!("to {group}"),
                    vec![],
                    group,
                    AssignmentStrategyKind::LeastBusy,
                    1,
                ))
                .await
                .unwrap();
            assert_eq!(saved.created_at, Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        }

        let t = ticket(f.tenant, "network");
        for _ in 0..5 {
            assert_eq!(f.router.auto_assign(&t).await.unwrap(), Some(f.bob));
        }
    }

    #[tokio::test]
    async fn test_resolve_target() {
        let f = fixture(None).await;
        let t = ticket(f.tenant, "network");
        let direct = UserId::new();
        assert_eq!(
            f.router
                .resolve_target(f.tenant, &EscalationTarget::User { user_id: direct }, &t)
                .await
                .unwrap(),
            direct
        );

        let empty_group = EscalationTarget::Group {
            name: "nobody".into(),
            strategy: AssignmentStrategyKind::RoundRobin,
        };
        assert!(f.router.resolve_target(f.tenant, &empty_group, &t).await.is_err());
    }
}
