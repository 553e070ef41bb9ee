mod common;

use std::sync::Arc;

use rundag::report::{EndOptions, Report, ReportError, Run, RunReason, RunResult};
use rundag::run::{DependencyOrder, RunQueue};

use common::{run_queue, runner_options, FakeExecutor, UnitBuilder};

#[test]
fn runs_can_be_added_ensured_and_ended() {
    let report = Report::new();

    report.add_run(Run::new("a")).unwrap();
    report.ensure_run("a").unwrap();
    report.ensure_run("b").unwrap();

    report.end_run("a", EndOptions::default()).unwrap();
    report
        .end_run(
            "b",
            EndOptions::default()
                .with_result(RunResult::Failed)
                .with_reason(RunReason::RunError)
                .with_cause("kaboom"),
        )
        .unwrap();

    let runs = report.runs();
    assert_eq!(runs.len(), 2);

    assert_eq!(runs[0].path, "a");
    assert_eq!(runs[0].result, Some(RunResult::Succeeded));
    assert!(runs[0].ended());

    assert_eq!(runs[1].path, "b");
    assert_eq!(runs[1].result, Some(RunResult::Failed));
    assert_eq!(runs[1].reason, Some(RunReason::RunError));
    assert_eq!(runs[1].cause.as_deref(), Some("kaboom"));
}

#[test]
fn adding_a_duplicate_run_fails() {
    let report = Report::new();
    report.add_run(Run::new("a")).unwrap();

    assert_eq!(
        report.add_run(Run::new("a")),
        Err(ReportError::DuplicateRun("a".to_string()))
    );
}

#[test]
fn ending_a_missing_run_is_recoverable() {
    let report = Report::new();

    assert_eq!(
        report.end_run("ghost", EndOptions::default()),
        Err(ReportError::RunNotFound("ghost".to_string()))
    );

    // The distinguished error is recoverable: callers synthesize the run.
    report.ensure_run("ghost").unwrap();
    report.end_run("ghost", EndOptions::default()).unwrap();
}

#[tokio::test]
async fn successful_units_are_recorded_as_succeeded() {
    let units = vec![
        UnitBuilder::new("a").build(),
        UnitBuilder::new("b").after("a").build(),
    ];

    let queue = RunQueue::linked(units, DependencyOrder::Normal).unwrap();
    let executor = Arc::new(FakeExecutor::new());
    let opts = Arc::new(runner_options(executor));
    let report = Arc::new(Report::new());

    run_queue(&queue, &opts, Some(&report), 2).await.unwrap();

    let runs = report.runs();
    assert_eq!(runs.len(), 2);
    for run in runs {
        assert_eq!(run.result, Some(RunResult::Succeeded), "unit {}", run.path);
        assert!(run.ended());
    }
}

#[tokio::test]
async fn failed_units_are_recorded_with_their_cause() {
    let queue = RunQueue::linked(vec![UnitBuilder::new("a").build()], DependencyOrder::Normal)
        .unwrap();
    let executor = Arc::new(FakeExecutor::failing(["a"]));
    let opts = Arc::new(runner_options(executor));
    let report = Arc::new(Report::new());

    run_queue(&queue, &opts, Some(&report), 1).await.unwrap_err();

    let runs = report.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].result, Some(RunResult::Failed));
    assert_eq!(runs[0].reason, Some(RunReason::RunError));
    assert!(runs[0].cause.as_deref().unwrap_or("").contains("exploded"));
}

#[tokio::test]
async fn summary_counts_runs_by_result() {
    let units = vec![
        UnitBuilder::new("ok").build(),
        UnitBuilder::new("bad").build(),
        UnitBuilder::new("child").after("bad").build(),
        UnitBuilder::new("skipped").excluded().build(),
    ];

    let queue = RunQueue::linked(units, DependencyOrder::Normal).unwrap();
    let report = Arc::new(Report::new());
    let (queue, _) = queue.remove_excluded(Some(&report));

    let executor = Arc::new(FakeExecutor::failing(["bad"]));
    let opts = Arc::new(runner_options(executor));

    run_queue(&queue, &opts, Some(&report), 2).await.unwrap_err();

    let summary = report.summary();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.early_exits, 1);
    assert_eq!(summary.excluded, 1);
}
