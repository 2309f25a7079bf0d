//! Integration tests for auto-assignment, escalation, reminders and the
//! scheduler.

mod common;

use std::time::Duration as StdDuration;

use itsm_core::UserId;
use itsm_sla::{
    Assignee, AssignmentGroup, AssignmentStrategyKind, AutoAssignmentRule, AutoEscalationRule,
    AutomationRuleStore, Condition, EscalationJob, EscalationReason, EscalationTarget,
    ReminderKind, SlaEngineConfig, SlaScheduler, Ticket, TicketPriority, TicketStatus,
    TicketStore,
};

use common::{t0, TestContext};

async fn tier2(ctx: &TestContext, members: &[UserId]) {
    ctx.stores
        .automation
        .upsert_group(AssignmentGroup {
            tenant_id: ctx.tenant,
            name: "tier2".to_string(),
            members: members.iter().copied().map(Assignee::new).collect(),
        })
        .await
        .unwrap();
}

/// Register an assigned ticket and move it to `in_progress`.
async fn working_ticket(ctx: &TestContext, title: &str) -> Ticket {
    let ticket = ctx
        .engine
        .register_ticket(ctx.incident(title).with_assignee(ctx.agent))
        .await
        .unwrap();
    ctx.engine
        .transition_status(ctx.tenant, ticket.id, TicketStatus::InProgress, ctx.agent, None)
        .await
        .unwrap()
        .ticket
}

// ============================================================================
// Auto-assignment
// ============================================================================

#[tokio::test]
async fn test_unassigned_ticket_is_routed_on_transition() {
    let ctx = TestContext::new();
    let ticket = ctx
        .engine
        .register_ticket(ctx.incident("Nobody owns this"))
        .await
        .unwrap();
    assert!(ticket.assignee_id.is_none());

    let member = UserId::new();
    tier2(&ctx, &[member]).await;
    ctx.engine
        .router()
        .upsert_rule(AutoAssignmentRule::new(
            ctx.tenant,
            "High to tier2",
            vec![Condition::Priority(TicketPriority::High)],
            "tier2",
            AssignmentStrategyKind::RoundRobin,
            1,
        ))
        .await
        .unwrap();

    let outcome = ctx
        .engine
        .transition_status(ctx.tenant, ticket.id, TicketStatus::InProgress, ctx.agent, None)
        .await
        .unwrap();
    assert_eq!(outcome.ticket.assignee_id, Some(member));

    let stored = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(stored.assignee_id, Some(member));
}

#[tokio::test]
async fn test_round_robin_rotates_members() {
    let ctx = TestContext::new();
    let first = UserId::new();
    let second = UserId::new();
    tier2(&ctx, &[first, second]).await;
    ctx.engine
        .router()
        .upsert_rule(AutoAssignmentRule::new(
            ctx.tenant,
            "Everything to tier2",
            Vec::new(),
            "tier2",
            AssignmentStrategyKind::RoundRobin,
            1,
        ))
        .await
        .unwrap();

    let mut assignees = Vec::new();
    for title in ["a", "b", "c"] {
        let ticket = ctx.engine.register_ticket(ctx.incident(title)).await.unwrap();
        assignees.push(ticket.assignee_id);
    }
    assert_eq!(assignees, vec![Some(first), Some(second), Some(first)]);
}

#[tokio::test]
async fn test_non_matching_rule_falls_back_to_default_assignee() {
    let fallback = UserId::new();
    let ctx = TestContext::with_config(SlaEngineConfig::default().with_default_assignee(fallback));
    tier2(&ctx, &[UserId::new()]).await;
    ctx.engine
        .router()
        .upsert_rule(AutoAssignmentRule::new(
            ctx.tenant,
            "Hardware only",
            vec![Condition::Category("hardware".to_string())],
            "tier2",
            AssignmentStrategyKind::LeastBusy,
            1,
        ))
        .await
        .unwrap();

    let ticket = ctx
        .engine
        .register_ticket(ctx.incident("No category"))
        .await
        .unwrap();
    assert_eq!(ticket.assignee_id, Some(fallback));
}

#[tokio::test]
async fn test_tied_assignment_rules_prefer_first_created() {
    for _ in 0..8 {
        let ctx = TestContext::new();
        let early = UserId::new();
        let late = UserId::new();
        for (group, member) in [("early", early), ("late", late)] {
            ctx.stores
                .automation
                .upsert_group(AssignmentGroup {
                    tenant_id: ctx.tenant,
                    name: group.to_string(),
                    members: vec![Assignee::new(member)],
                })
                .await
                .unwrap();
            let rule = ctx
                .engine
                .router()
                .upsert_rule(AutoAssignmentRule::new(
                    ctx.tenant,
                    format!("Everything to {group}"),
                    Vec::new(),
                    group,
                    AssignmentStrategyKind::RoundRobin,
                    5,
                ))
                .await
                .unwrap();
            assert_eq!(rule.created_at, t0());
        }

        let ticket = ctx.engine.register_ticket(ctx.incident("Tie")).await.unwrap();
        assert_eq!(ticket.assignee_id, Some(early));
    }
}

// ============================================================================
// Escalation
// ============================================================================

#[tokio::test]
async fn test_sweep_first_matching_rule_wins() {
    let ctx = TestContext::new();
    let lead = UserId::new();
    let member = UserId::new();
    tier2(&ctx, &[member]).await;

    let specific = ctx
        .engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "High to lead",
            vec![Condition::Priority(TicketPriority::High)],
            EscalationTarget::User { user_id: lead },
            30,
            1,
        ))
        .await
        .unwrap();
    ctx.engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "Anything to tier2",
            Vec::new(),
            EscalationTarget::Group {
                name: "tier2".to_string(),
                strategy: AssignmentStrategyKind::RoundRobin,
            },
            10,
            2,
        ))
        .await
        .unwrap();

    let ticket = working_ticket(&ctx, "Outage").await;
    assert_eq!(ticket.escalation_level, 0);

    ctx.at_minute(31);
    let stats = ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.escalated, 1);
    assert_eq!(stats.failed, 0);

    let escalated = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(escalated.assignee_id, Some(lead));
    assert_eq!(escalated.escalation_level, 1);

    let history = ctx
        .engine
        .escalation()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rule_id, Some(specific.id));
    assert_eq!(history[0].reason, EscalationReason::Timeout);
    assert_eq!(history[0].previous_assignee, Some(ctx.agent));

    // Already with the lead: the next sweep leaves it alone.
    ctx.at_minute(40);
    let stats = ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
    assert_eq!(stats.escalated, 0);
    assert_eq!(stats.already_escalated, 1);
    let unchanged = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(unchanged.escalation_level, 1);
}

#[tokio::test]
async fn test_time_limit_is_exclusive() {
    let ctx = TestContext::new();
    let lead = UserId::new();
    ctx.engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "After 30 minutes",
            Vec::new(),
            EscalationTarget::User { user_id: lead },
            30,
            1,
        ))
        .await
        .unwrap();
    let ticket = working_ticket(&ctx, "Borderline").await;

    ctx.at_minute(30);
    let stats = ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
    assert_eq!(stats.escalated, 0);
    assert!(ctx.engine.escalation().candidates(ctx.tenant).await.unwrap().is_empty());

    ctx.at_minute(31);
    let candidates = ctx.engine.escalation().candidates(ctx.tenant).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].ticket_id, ticket.id);
    assert_eq!(candidates[0].minutes_over_limit, 1);
}

#[tokio::test]
async fn test_sweep_skips_open_and_resolved_tickets() {
    let ctx = TestContext::new();
    ctx.engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "Immediate",
            Vec::new(),
            EscalationTarget::User {
                user_id: UserId::new(),
            },
            0,
            1,
        ))
        .await
        .unwrap();

    let open = ctx
        .engine
        .register_ticket(ctx.incident("Still open").with_assignee(ctx.agent))
        .await
        .unwrap();
    let resolved = working_ticket(&ctx, "Done").await;
    ctx.engine
        .transition_status(ctx.tenant, resolved.id, TicketStatus::Resolved, ctx.agent, None)
        .await
        .unwrap();

    ctx.at_minute(5);
    let stats = ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
    assert_eq!(stats.processed, 0);
    assert_eq!(stats.escalated, 0);

    let open = ctx.engine.ticket(ctx.tenant, open.id).await.unwrap();
    assert_eq!(open.escalation_level, 0);
}

#[tokio::test]
async fn test_group_target_without_members_counts_failure() {
    let ctx = TestContext::new();
    tier2(&ctx, &[]).await;
    ctx.engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "Empty group",
            Vec::new(),
            EscalationTarget::Group {
                name: "tier2".to_string(),
                strategy: AssignmentStrategyKind::LeastBusy,
            },
            0,
            1,
        ))
        .await
        .unwrap();
    working_ticket(&ctx, "Orphan").await;

    ctx.at_minute(1);
    let stats = EscalationJob::new(ctx.engine.clone())
        .poll(ctx.tenant)
        .await
        .expect("per-item failures must not abort the poll");
    assert_eq!(stats.sweep.processed, 1);
    assert_eq!(stats.sweep.failed, 1);
}

#[tokio::test]
async fn test_group_escalation_does_not_repeat_on_later_sweeps() {
    let ctx = TestContext::new();
    let first = UserId::new();
    let second = UserId::new();
    tier2(&ctx, &[first, second]).await;
    let rule = ctx
        .engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "Stale to tier2",
            Vec::new(),
            EscalationTarget::Group {
                name: "tier2".to_string(),
                strategy: AssignmentStrategyKind::RoundRobin,
            },
            30,
            1,
        ))
        .await
        .unwrap();
    let ticket = working_ticket(&ctx, "Slow VPN").await;

    let mut escalated = 0;
    let mut already_escalated = 0;
    for minute in [31, 36, 41, 46, 51] {
        ctx.at_minute(minute);
        let stats = ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
        escalated += stats.escalated;
        already_escalated += stats.already_escalated;
    }
    assert_eq!(escalated, 1);
    assert_eq!(already_escalated, 4);

    let stored = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(stored.escalation_level, 1);
    assert_eq!(stored.assignee_id, Some(first));

    let history = ctx
        .engine
        .escalation()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rule_id, Some(rule.id));
}

#[tokio::test]
async fn test_tied_escalation_rules_prefer_first_created() {
    let ctx = TestContext::new();
    let early = UserId::new();
    let late = UserId::new();
    for (name, lead) in [("Early rule", early), ("Late rule", late)] {
        let rule = ctx
            .engine
            .escalation()
            .upsert_rule(AutoEscalationRule::new(
                ctx.tenant,
                name,
                Vec::new(),
                EscalationTarget::User { user_id: lead },
                10,
                1,
            ))
            .await
            .unwrap();
        assert_eq!(rule.created_at, t0());
    }
    let ticket = working_ticket(&ctx, "Tie").await;

    ctx.at_minute(11);
    let candidates = ctx.engine.escalation().candidates(ctx.tenant).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].rule_name, "Early rule");

    ctx.engine.run_escalation_sweep(ctx.tenant).await.unwrap();
    let stored = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(stored.assignee_id, Some(early));
}

#[tokio::test]
async fn test_manual_escalation_increments_level() {
    let ctx = TestContext::new();
    let manager = UserId::new();
    let ticket = working_ticket(&ctx, "VIP laptop").await;

    let escalated = ctx
        .engine
        .manual_escalate(ctx.tenant, ticket.id, manager, "customer escalation", Some(ctx.agent))
        .await
        .unwrap();
    assert_eq!(escalated.assignee_id, Some(manager));
    assert_eq!(escalated.escalation_level, ticket.escalation_level + 1);

    let history = ctx
        .engine
        .escalation()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, EscalationReason::ManualEscalation);
    assert_eq!(history[0].actor_id, Some(ctx.agent));
    assert_eq!(history[0].comment, "customer escalation");
    assert_eq!(history[0].level, 1);
}

// ============================================================================
// Reminders
// ============================================================================

#[tokio::test]
async fn test_unassigned_reminder_is_sent_once() {
    let supervisor = UserId::new();
    let ctx =
        TestContext::with_config(SlaEngineConfig::default().with_supervisors(vec![supervisor]));
    let ticket = ctx
        .engine
        .register_ticket(ctx.incident("Nobody home"))
        .await
        .unwrap();
    let job = EscalationJob::new(ctx.engine.clone());

    ctx.at_minute(119);
    assert_eq!(job.poll(ctx.tenant).await.unwrap().reminders.unassigned, 0);

    ctx.at_minute(120);
    assert_eq!(job.poll(ctx.tenant).await.unwrap().reminders.unassigned, 1);
    for minute in [125, 180, 300] {
        ctx.at_minute(minute);
        let stats = job.poll(ctx.tenant).await.unwrap();
        assert_eq!(stats.reminders.unassigned, 0);
        assert_eq!(stats.reminders.long_pending, 0);
    }

    let sent = ctx.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, vec![supervisor]);
    assert_eq!(sent[0].message.ticket_id, ticket.id);

    let history = ctx
        .engine
        .reminders()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, ReminderKind::Unassigned);
    assert!(history[0].notification_sent);
}

#[tokio::test]
async fn test_reminder_refires_after_condition_clears() {
    let supervisor = UserId::new();
    let ctx =
        TestContext::with_config(SlaEngineConfig::default().with_supervisors(vec![supervisor]));
    let ticket = ctx
        .engine
        .register_ticket(ctx.incident("Hot potato"))
        .await
        .unwrap();

    ctx.at_minute(120);
    assert_eq!(ctx.engine.run_reminders(ctx.tenant).await.unwrap().unassigned, 1);

    let mut assigned = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assigned.assignee_id = Some(ctx.agent);
    ctx.stores.tickets.update(assigned).await.unwrap();
    ctx.at_minute(130);
    let stats = ctx.engine.run_reminders(ctx.tenant).await.unwrap();
    assert_eq!(stats.cleared, 1);
    assert_eq!(stats.unassigned, 0);

    let mut dropped = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    dropped.assignee_id = None;
    ctx.stores.tickets.update(dropped).await.unwrap();
    ctx.at_minute(140);
    assert_eq!(ctx.engine.run_reminders(ctx.tenant).await.unwrap().unassigned, 1);

    let history = ctx
        .engine
        .reminders()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].resolved_at.is_some());
    assert!(history[1].resolved_at.is_none());
    assert_eq!(ctx.sink.count().await, 2);
}

#[tokio::test]
async fn test_long_pending_reminder_reaches_ticket_people() {
    let supervisor = UserId::new();
    let requester = UserId::new();
    let ctx = TestContext::with_config(
        SlaEngineConfig::default()
            .with_supervisors(vec![supervisor])
            .with_reminder_thresholds(8 * 60, 120),
    );
    let ticket = ctx
        .engine
        .register_ticket(
            ctx.incident("Replace monitor")
                .with_assignee(ctx.agent)
                .with_requester(requester),
        )
        .await
        .unwrap();
    let job = EscalationJob::new(ctx.engine.clone());

    ctx.at_minute(8 * 60 - 1);
    assert_eq!(job.poll(ctx.tenant).await.unwrap().reminders.long_pending, 0);
    ctx.at_minute(8 * 60);
    assert_eq!(job.poll(ctx.tenant).await.unwrap().reminders.long_pending, 1);
    ctx.at_minute(10 * 60);
    assert_eq!(job.poll(ctx.tenant).await.unwrap().reminders.long_pending, 0);

    let sent = ctx.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, vec![requester, ctx.agent, supervisor]);

    ctx.engine
        .transition_status(ctx.tenant, ticket.id, TicketStatus::Cancelled, ctx.agent, None)
        .await
        .unwrap();
    ctx.at_minute(10 * 60 + 5);
    let stats = job.poll(ctx.tenant).await.unwrap();
    assert_eq!(stats.reminders.cleared, 1);
    assert_eq!(ctx.stores.reminders.count().await, 1);
}

#[tokio::test]
async fn test_reminder_without_recipients_is_recorded_undelivered() {
    let ctx = TestContext::new();
    let ticket = ctx
        .engine
        .register_ticket(ctx.incident("Quiet queue"))
        .await
        .unwrap();

    ctx.at_minute(120);
    assert_eq!(ctx.engine.run_reminders(ctx.tenant).await.unwrap().unassigned, 1);
    ctx.at_minute(180);
    assert_eq!(ctx.engine.run_reminders(ctx.tenant).await.unwrap().unassigned, 0);

    let history = ctx
        .engine
        .reminders()
        .history(ctx.tenant, ticket.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].notification_sent);
    assert_eq!(ctx.sink.count().await, 0);
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_sweep_and_shuts_down() {
    let ctx = TestContext::new();
    let lead = UserId::new();
    ctx.engine
        .escalation()
        .upsert_rule(AutoEscalationRule::new(
            ctx.tenant,
            "Immediate",
            Vec::new(),
            EscalationTarget::User { user_id: lead },
            0,
            1,
        ))
        .await
        .unwrap();
    let ticket = working_ticket(&ctx, "Background").await;
    ctx.at_minute(1);

    let mut scheduler = SlaScheduler::new(ctx.engine.clone())
        .with_intervals(StdDuration::from_secs(1), StdDuration::from_secs(1));
    scheduler.start_tenant(ctx.tenant);
    assert_eq!(scheduler.running_loops(), 2);

    tokio::time::sleep(StdDuration::from_millis(1500)).await;
    scheduler.shutdown().await;

    let stored = ctx.engine.ticket(ctx.tenant, ticket.id).await.unwrap();
    assert_eq!(stored.assignee_id, Some(lead));
    assert_eq!(stored.escalation_level, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_stops_on_external_cancel() {
    let ctx = TestContext::new();
    let mut scheduler = SlaScheduler::new(ctx.engine.clone());
    scheduler.start_tenant(ctx.tenant);

    scheduler.cancellation_token().cancel();
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    assert_eq!(scheduler.running_loops(), 0);
    scheduler.shutdown().await;
}
