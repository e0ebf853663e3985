//! How groups with destinations are narrowed, kept whole, or dropped across runs.

use crate::fixture::{Project, RecordingRunner, Reply};
use changed_core::{MemoryConfigStore, Orchestrator, RunOutcome};
use serde_json::{Value, json};

fn store_with(target: Value) -> MemoryConfigStore {
    MemoryConfigStore::from_value(json!({ "concat": { "dist": target } }))
        .expect("valid tasks")
}

#[tokio::test]
async fn test_fan_in_rebuilds_from_every_source() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let out = project.write("out.js", "ab");
    let mut store = store_with(json!({ "src": [first, second], "dest": out }));
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("first run");
    project.write("b.js", "b changed");
    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("second run");

    assert_eq!(runner.calls().len(), 2);
    assert_eq!(
        runner.last_config(),
        json!({ "files": [{ "src": [first, second], "dest": out }] })
    );
}

#[tokio::test]
async fn test_missing_destination_forces_rerun() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let out = project.write("out.js", "a");
    let mut store = store_with(json!({ "src": [first], "dest": out }));
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("first run");
    let unchanged = orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("second run");
    assert_eq!(unchanged.outcome, RunOutcome::Unchanged);

    project.remove("out.js");
    let rerun = orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("third run");

    assert!(matches!(rerun.outcome, RunOutcome::Completed { .. }));
    assert_eq!(
        runner.last_config(),
        json!({ "files": [{ "src": [first], "dest": out }] })
    );
}

#[tokio::test]
async fn test_in_place_groups_narrow_per_file() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let mut store = store_with(json!({
        "files": [
            { "src": [first], "dest": first, "expand": true },
            { "src": [second], "dest": second, "expand": true }
        ]
    }));
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("first run");
    project.write("a.js", "a changed");
    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("second run");

    assert_eq!(
        runner.last_config(),
        json!({ "files": [{ "src": [first], "dest": first, "expand": true }] })
    );
}

#[tokio::test]
async fn test_destination_map_keeps_only_changed_groups() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let first_out = project.write("a.min.js", "a");
    let second_out = project.write("b.min.js", "b");
    let mut files = serde_json::Map::new();
    files.insert(first_out.clone(), json!([first]));
    files.insert(second_out.clone(), json!(second));
    let mut store = store_with(json!({ "files": files }));
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("first run");
    project.write("b.js", "b changed");
    orchestrator
        .run(&mut store, &runner, "concat", "dist", &[])
        .await
        .expect("second run");

    assert_eq!(
        runner.last_config(),
        json!({ "files": [{ "src": [second], "dest": second_out }] })
    );
}
