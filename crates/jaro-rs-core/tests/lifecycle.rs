//! Engine integration tests driven through scripted ports.

use chrono::Duration;
use jaro_rs_config::EngineConfig;
use jaro_rs_core::memory::{
    InMemoryApprovalRepository, InMemoryAuditRepository, InMemoryTaskRepository,
    InMemoryToolRegistry,
};
use jaro_rs_core::{
    ApprovalRepository, Clock, CoreError, EnginePorts, FAILURE_REASON_KEY, Orchestrator,
    PlanRepository, RequestContext, TaskRepository,
};
use jaro_rs_protocol::audit::{
    APPROVAL_DECISION, APPROVAL_REQUESTED, STEP_COMPLETED, TASK_COMPLETED, TASK_CREATED,
    TASK_FAILED, TASK_PLANNED, TASK_VERIFIED,
};
use jaro_rs_protocol::{ApprovalRequest, RiskLevel, Step, StepStatus, StepType, TaskStatus};
use jaro_rs_test_utils::{
    BlockingExecutor, CancelAfterSavePlanRepository, CancelingPlanner, FailingAuditRepository,
    FailingPlanner, FixedClock, ForgetfulPlanRepository, RecordingLogger, ScriptedExecutor,
    ScriptedPlanner, SequentialIdGenerator, StalledPlanner, StubTool,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn ctx() -> RequestContext {
    RequestContext::new()
}

fn two_steps() -> Vec<Step> {
    vec![
        Step::new("s1", "Analyse request", StepType::Think),
        Step::new("s2", "Send report", StepType::ToolCall).with_tool("echo", "report"),
    ]
}

/// The reference scenario: a HIGH-risk booking pauses on its tool step,
/// resumes after approval and completes with a full audit trail.
#[tokio::test]
async fn book_a_flight_end_to_end() {
    let tools = InMemoryToolRegistry::with_builtin_tools();
    tools.register(Arc::new(
        StubTool::new("flight_booking", RiskLevel::High).with_category("travel"),
    ));
    let audit = Arc::new(InMemoryAuditRepository::new());
    let clock = Arc::new(FixedClock::epoch());
    let ports = EnginePorts::in_memory_with_tools(Arc::new(tools))
        .with_audit(audit.clone())
        .with_clock(clock.clone())
        .with_ids(Arc::new(SequentialIdGenerator::new("id")));
    let engine = Orchestrator::new(EngineConfig::default(), ports);

    let task = engine
        .start_task(&ctx(), "book a flight", "user-42")
        .await
        .expect("start");
    assert_eq!(task.id, "id-1");
    assert_eq!(task.status, TaskStatus::New);

    clock.advance(Duration::seconds(1));
    let waiting = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(waiting.status, TaskStatus::WaitingApproval);
    let plan = engine.get_plan(&ctx(), &task.id).await.expect("plan");
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[1].tool_name.as_deref(), Some("flight_booking"));
    assert!(plan.steps[1].requires_approval);
    assert_eq!(waiting.current_step_id.as_deref(), Some(plan.steps[1].id.as_str()));
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(plan.steps[1].status, StepStatus::Pending);

    let open = engine
        .ports()
        .approvals
        .list_open_approvals(&ctx())
        .await
        .expect("open approvals");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].step_id, plan.steps[1].id);

    clock.advance(Duration::seconds(1));
    let resumed = engine
        .handle_approval(&ctx(), &task.id, &plan.steps[1].id, true, "user-42")
        .await
        .expect("approve");
    assert_eq!(resumed.status, TaskStatus::Executing);

    let done = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.finished_at, Some(clock.now()));
    assert_eq!(
        done.artifacts.get(&plan.steps[1].id).map(String::as_str),
        Some("flight_booking: book a flight")
    );
    assert!(
        engine
            .ports()
            .approvals
            .list_open_approvals(&ctx())
            .await
            .expect("open approvals")
            .is_empty()
    );
    assert_eq!(
        audit.event_types_for_task(&task.id),
        vec![
            TASK_CREATED,
            TASK_PLANNED,
            STEP_COMPLETED,
            APPROVAL_REQUESTED,
            APPROVAL_DECISION,
            STEP_COMPLETED,
            TASK_VERIFIED,
            TASK_COMPLETED,
        ]
    );
}

/// Of many racing decisions on one gate, exactly one commits.
#[tokio::test]
async fn concurrent_approvals_commit_exactly_once() {
    let steps = vec![
        Step::new("s1", "Wire funds", StepType::ToolCall)
            .with_tool("echo", "pay")
            .with_risk(RiskLevel::High),
    ];
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(steps)))
        .with_executor(Arc::new(ScriptedExecutor::new()));
    let engine = Arc::new(Orchestrator::new(EngineConfig::default(), ports));
    let task = engine
        .start_task(&ctx(), "wire funds", "user-42")
        .await
        .expect("start");
    let waiting = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(waiting.status, TaskStatus::WaitingApproval);

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        let task_id = task.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .handle_approval(&RequestContext::new(), &task_id, "s1", i % 2 == 0, "reviewer")
                .await
        }));
    }
    let mut committed = Vec::new();
    for handle in handles {
        match handle.await.expect("join") {
            Ok(task) => committed.push(task.status),
            Err(err) => assert!(matches!(err, CoreError::FailedPrecondition(_)), "{err}"),
        }
    }
    assert_eq!(committed.len(), 1);
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, committed[0]);
}

/// Audit outages are logged and otherwise ignored.
#[tokio::test]
async fn audit_outage_is_logged_not_fatal() {
    let audit = Arc::new(FailingAuditRepository::new());
    let logger = Arc::new(RecordingLogger::new());
    let ports = EnginePorts::in_memory()
        .with_audit(audit.clone())
        .with_logger(logger.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);

    let task = engine
        .start_task(&ctx(), "echo hi", "user-42")
        .await
        .expect("start");
    let done = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(done.status, TaskStatus::Done);
    assert!(audit.attempts() >= 5);

    let warnings = logger.at_level("warn");
    assert!(!warnings.is_empty());
    assert!(warnings.iter().all(|line| line.message == "audit write failed"));
    assert_eq!(warnings[0].field("event_type"), Some(TASK_CREATED));
    assert_eq!(warnings[0].field("task_id"), Some(task.id.as_str()));
}

/// A planner error fails the task and surfaces to the caller.
#[tokio::test]
async fn planner_error_fails_task() {
    let audit = Arc::new(InMemoryAuditRepository::new());
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(FailingPlanner::new(CoreError::NoViablePlan(
            "nothing fits".to_string(),
        ))))
        .with_audit(audit.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "do the impossible", "user-42")
        .await
        .expect("start");

    let err = engine.run_task(&ctx(), &task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NoViablePlan(_)));
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(
        stored
            .metadata
            .get(FAILURE_REASON_KEY)
            .is_some_and(|reason| reason.contains("nothing fits"))
    );
    assert_eq!(
        audit.event_types_for_task(&task.id),
        vec![TASK_CREATED, TASK_FAILED]
    );
}

/// Plans that fail validation are treated like planner errors.
#[tokio::test]
async fn empty_plan_is_rejected() {
    let ports = EnginePorts::in_memory().with_planner(Arc::new(ScriptedPlanner::new(Vec::new())));
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "echo hi", "user-42")
        .await
        .expect("start");

    let err = engine.plan_task(&ctx(), &task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Fatal(_)), "{err}");
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Failed);
}

/// Executor infrastructure errors fail the task without retrying.
#[tokio::test]
async fn executor_error_fails_task_immediately() {
    let executor = Arc::new(
        ScriptedExecutor::new().push_error(CoreError::Unavailable("sandbox down".to_string())),
    );
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_executor(executor.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let err = engine.run_task(&ctx(), &task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Unavailable(_)));
    assert_eq!(executor.calls(), vec!["s1"]);
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Failed);
    let plan = engine.get_plan(&ctx(), &task.id).await.expect("plan");
    assert_eq!(plan.steps[0].status, StepStatus::Failed);
}

/// Logical failures are retried and their usage still counts.
#[tokio::test]
async fn logical_failures_retry_and_accumulate_usage() {
    let executor = Arc::new(
        ScriptedExecutor::new()
            .push_success("analysed")
            .push_failure("rate limited")
            .push_success("sent"),
    );
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_executor(executor.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let done = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(executor.calls(), vec!["s1", "s2", "s2"]);
    assert_eq!(done.usage_tokens, 25);
    assert_eq!(done.artifacts.get("s2").map(String::as_str), Some("sent"));
    let plan = engine.get_plan(&ctx(), &task.id).await.expect("plan");
    assert_eq!(plan.steps[1].retry_count, 2);
}

/// Zero retries means the first logical failure is final.
#[tokio::test]
async fn zero_retries_fails_on_first_failure() {
    let config = EngineConfig {
        max_step_retries: 0,
        ..EngineConfig::default()
    };
    let executor = Arc::new(ScriptedExecutor::new().push_failure("boom"));
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_executor(executor.clone());
    let engine = Orchestrator::new(config, ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let failed = engine.run_task(&ctx(), &task.id).await.expect("run");
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(executor.calls(), vec!["s1"]);
}

/// Canceling during planning rolls the task back to NEW.
#[tokio::test]
async fn canceled_planning_rolls_back() {
    let ports = EnginePorts::in_memory().with_planner(Arc::new(StalledPlanner));
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "echo hi", "user-42")
        .await
        .expect("start");

    let request = RequestContext::with_timeout(std::time::Duration::from_millis(20));
    let err = engine.run_task(&request, &task.id).await.unwrap_err();
    assert!(err.is_canceled());
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::New);
    assert_eq!(stored.plan_id, None);
}

/// A request canceled after the planner answered stores nothing and rolls
/// the task back to NEW.
#[tokio::test]
async fn canceled_after_planner_answer_rolls_back() {
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(CancelingPlanner::new(two_steps())));
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let err = engine.run_task(&ctx(), &task.id).await.unwrap_err();
    assert!(err.is_canceled());
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::New);
    assert_eq!(stored.plan_id, None);
    assert!(!stored.metadata.contains_key(FAILURE_REASON_KEY));
    let err = engine
        .ports()
        .plans
        .get_plan(&ctx(), &format!("plan-{}", task.id))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

/// Once the plan is stored, a cancellation no longer strands the task in
/// PLANNING; a later run picks it up.
#[tokio::test]
async fn cancel_after_plan_is_stored_still_commits() {
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_plans(Arc::new(CancelAfterSavePlanRepository::new()));
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let err = engine.run_task(&ctx(), &task.id).await.unwrap_err();
    assert!(err.is_canceled());
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Executing);
    assert_eq!(stored.plan_id, Some(format!("plan-{}", task.id)));
    assert_eq!(stored.current_step_id.as_deref(), Some("s1"));

    let done = engine.run_task(&ctx(), &task.id).await.expect("rerun");
    assert_eq!(done.status, TaskStatus::Done);
}

/// An executing task whose plan has vanished is failed rather than left
/// executing.
#[tokio::test]
async fn lost_plan_fails_task() {
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_plans(Arc::new(ForgetfulPlanRepository));
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let err = engine.run_task(&ctx(), &task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Fatal(_)), "{err}");
    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Failed);
    let reason = stored.metadata.get(FAILURE_REASON_KEY).expect("reason");
    assert!(reason.contains("missing"), "{reason}");
}

/// Canceling a running step leaves it pending for the next run.
#[tokio::test]
async fn canceled_step_is_left_pending() {
    let executor = Arc::new(BlockingExecutor::new());
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_executor(executor.clone());
    let engine = Arc::new(Orchestrator::new(EngineConfig::default(), ports));
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let request = RequestContext::new();
    let running = {
        let engine = engine.clone();
        let request = request.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move { engine.run_task(&request, &task_id).await })
    };
    executor.wait_started().await;
    request.cancel();
    let err = running.await.expect("join").unwrap_err();
    assert!(err.is_canceled());

    let stored = engine.get_task_status(&ctx(), &task.id).await.expect("task");
    assert_eq!(stored.status, TaskStatus::Executing);
    assert_eq!(stored.current_step_id.as_deref(), Some("s1"));
    let plan = engine.get_plan(&ctx(), &task.id).await.expect("plan");
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
    assert_eq!(plan.steps[0].retry_count, 1);
}

/// Canceling the task while a step runs wins over the step's result.
#[tokio::test]
async fn cancel_during_execution_wins() {
    let executor = Arc::new(BlockingExecutor::new());
    let ports = EnginePorts::in_memory()
        .with_planner(Arc::new(ScriptedPlanner::new(two_steps())))
        .with_executor(executor.clone());
    let engine = Arc::new(Orchestrator::new(EngineConfig::default(), ports));
    let task = engine
        .start_task(&ctx(), "report", "user-42")
        .await
        .expect("start");

    let running = {
        let engine = engine.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move { engine.run_task(&RequestContext::new(), &task_id).await })
    };
    executor.wait_started().await;
    engine
        .cancel_task(&ctx(), &task.id, "user-42")
        .await
        .expect("cancel");
    executor.release();

    let finished = running.await.expect("join").expect("run");
    assert_eq!(finished.status, TaskStatus::Canceled);
    assert!(finished.artifacts.is_empty());
    let plan = engine.get_plan(&ctx(), &task.id).await.expect("plan");
    assert_eq!(plan.steps[0].status, StepStatus::Pending);
    assert_eq!(plan.steps[0].result_ref, None);
}

/// Task ids and user ids are validated before any state is touched.
#[tokio::test]
async fn rejects_blank_arguments() {
    let tasks = Arc::new(InMemoryTaskRepository::new());
    let ports = EnginePorts::in_memory().with_tasks(tasks.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);

    for err in [
        engine.start_task(&ctx(), "", "user-42").await.unwrap_err(),
        engine.run_task(&ctx(), " ").await.unwrap_err(),
        engine.plan_task(&ctx(), "").await.unwrap_err(),
        engine.get_task_status(&ctx(), "").await.unwrap_err(),
        engine.cancel_task(&ctx(), "t1", "").await.unwrap_err(),
    ] {
        assert!(matches!(err, CoreError::InvalidArgument(_)), "{err}");
    }
    assert!(tasks.is_empty());
    let err = tasks.get_task(&ctx(), "t1").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

/// An open approval left behind for a task that never parked is not
/// reported as pending.
#[tokio::test]
async fn pending_approval_ignores_tasks_not_waiting() {
    let approvals = Arc::new(InMemoryApprovalRepository::new());
    let ports = EnginePorts::in_memory().with_approvals(approvals.clone());
    let engine = Orchestrator::new(EngineConfig::default(), ports);
    let task = engine
        .start_task(&ctx(), "echo hi", "user-42")
        .await
        .expect("start");
    let step = Step::new("s1", "Wire funds", StepType::ApprovalGate);
    let orphan = ApprovalRequest::open("a1", &task.id, &step, task.created_at);
    approvals
        .save_approval(&ctx(), &orphan)
        .await
        .expect("save approval");

    assert_eq!(
        engine.pending_approval(&ctx(), &task.id).await.expect("lookup"),
        None
    );
}
