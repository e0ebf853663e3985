//! Override hooks can add unchanged files to a run but never drop changed ones.

use crate::fixture::{Project, RecordingRunner, Reply};
use changed_core::{
    ChangedOptions, FnOverride, MemoryConfigStore, Orchestrator, OverrideDetails, RunOutcome,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_always_option_reruns_named_file() {
    let project = Project::new();
    let one = project.write("one.js", "1");
    let two = project.write("two.js", "2");
    let three = project.write("three.js", "3");
    let mut store = MemoryConfigStore::from_value(json!({
        "log": { "all": { "files": [one, two, three] } }
    }))
    .expect("valid tasks");
    let options = ChangedOptions {
        always: vec!["three.js".to_owned()],
        ..project.options()
    };
    let orchestrator = Orchestrator::new(options);
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "log", "all", &[])
        .await
        .expect("first run");
    let report = orchestrator
        .run(&mut store, &runner, "log", "all", &[])
        .await
        .expect("second run");

    assert!(matches!(report.outcome, RunOutcome::Completed { .. }));
    assert_eq!(runner.last_config(), json!({ "files": [three] }));
}

#[tokio::test]
async fn test_override_cannot_drop_changed_file() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let mut store =
        MemoryConfigStore::from_value(json!({ "log": { "all": { "files": [first] } } }))
            .expect("valid tasks");
    let orchestrator = Orchestrator::new(project.options())
        .with_override(Arc::new(FnOverride::new(|_: &OverrideDetails<'_>| false)));

    let changed = orchestrator
        .changed_groups(&store, "log", "all")
        .await
        .expect("dry run");
    assert_eq!(changed.len(), 1);

    let runner = RecordingRunner::new(Reply::Succeed);
    orchestrator
        .run(&mut store, &runner, "log", "all", &[])
        .await
        .expect("run succeeds");
    project.write("a.js", "a changed");

    let changed_again = orchestrator
        .changed_groups(&store, "log", "all")
        .await
        .expect("dry run");
    assert_eq!(changed_again.len(), 1);
    assert_eq!(changed_again[0].src, vec![first]);
}

#[tokio::test]
async fn test_override_sees_committed_hash() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let mut store =
        MemoryConfigStore::from_value(json!({ "log": { "all": { "files": [first] } } }))
            .expect("valid tasks");
    let runner = RecordingRunner::new(Reply::Succeed);
    Orchestrator::new(project.options())
        .run(&mut store, &runner, "log", "all", &[])
        .await
        .expect("commit hashes");

    let orchestrator = Orchestrator::new(project.options()).with_override(Arc::new(
        FnOverride::new(|details: &OverrideDetails<'_>| {
            details.task() == "log" && details.path.ends_with("a.js")
        }),
    ));
    let changed = orchestrator
        .changed_groups(&store, "log", "all")
        .await
        .expect("dry run");

    assert_eq!(changed.len(), 1);
}
