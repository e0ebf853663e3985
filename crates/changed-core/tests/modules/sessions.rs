//! Prepare/finish pairing, alias expansion over targets, and cache cleanup.

use crate::fixture::{Project, RecordingRunner, Reply};
use changed_core::{
    ConfigStore as _, Error, MemoryConfigStore, NoOverride, Orchestrator, Prepared,
    SnapshotRegistry, hash_store,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_interleaved_sessions_restore_independently() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let original = json!({
        "log": {
            "one": { "files": [first], "tag": 1 },
            "two": { "files": [second], "tag": 2 }
        }
    });
    let mut store = MemoryConfigStore::from_value(original.clone()).expect("valid tasks");
    let orchestrator = Orchestrator::new(project.options());

    let Prepared::Pending(one) = orchestrator
        .prepare(&mut store, "log", "one")
        .await
        .expect("prepare one")
    else {
        panic!("first run of `one` should be pending");
    };
    let Prepared::Pending(two) = orchestrator
        .prepare(&mut store, "log", "two")
        .await
        .expect("prepare two")
    else {
        panic!("first run of `two` should be pending");
    };
    assert_ne!(one.ticket(), two.ticket());
    assert_eq!(orchestrator.outstanding(), 2);

    let report_two = orchestrator
        .finish(&mut store, two)
        .await
        .expect("finish two");
    assert_eq!(report_two.committed, vec![second]);
    assert_eq!(
        store.get("log", "one").expect("target"),
        json!({ "files": [first], "tag": 1 })
    );

    orchestrator
        .finish(&mut store, one)
        .await
        .expect("finish one");
    assert_eq!(
        MemoryConfigStore::from_value(original).expect("valid tasks"),
        store
    );
    assert_eq!(orchestrator.outstanding(), 0);
}

#[tokio::test]
async fn test_session_from_other_orchestrator_is_rejected() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let mut store =
        MemoryConfigStore::from_value(json!({ "log": { "all": { "files": [first] } } }))
            .expect("valid tasks");
    let preparing = Orchestrator::new(project.options());
    let finishing = Orchestrator::new(project.options());

    let Prepared::Pending(session) = preparing
        .prepare(&mut store, "log", "all")
        .await
        .expect("prepare")
    else {
        panic!("first run should be pending");
    };
    let ticket = session.ticket();

    let error = finishing.finish(&mut store, session).await.unwrap_err();
    assert!(matches!(error, Error::UnknownTicket(found) if found == ticket));
    assert!(error.is_fatal_config());
}

#[test]
fn test_registry_restores_once() {
    let mut registry = SnapshotRegistry::new();
    let ticket = registry.take(json!({ "src": ["a.js"] }), Vec::new(), Arc::new(NoOverride));

    let snapshot = registry.restore(ticket).expect("first restore");
    assert_eq!(snapshot.original_config, json!({ "src": ["a.js"] }));
    assert!(matches!(
        registry.restore(ticket),
        Err(Error::UnknownTicket(_))
    ));
}

#[tokio::test]
async fn test_unchanged_prepare_takes_no_snapshot() {
    let project = Project::new();
    let mut store =
        MemoryConfigStore::from_value(json!({ "log": { "all": { "banner": "x" } } }))
            .expect("valid tasks");
    let orchestrator = Orchestrator::new(project.options());

    let prepared = orchestrator
        .prepare(&mut store, "log", "all")
        .await
        .expect("prepare");

    assert!(matches!(prepared, Prepared::Unchanged));
    assert_eq!(orchestrator.outstanding(), 0);
    assert_eq!(
        store.get("log", "all").expect("target"),
        json!({ "banner": "x" })
    );
}

#[tokio::test]
async fn test_run_all_expands_targets() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let mut store = MemoryConfigStore::from_value(json!({
        "log": {
            "options": { "verbose": true },
            "_shared": { "files": [first] },
            "one": { "files": [first] },
            "two": { "files": [second] }
        }
    }))
    .expect("valid tasks");
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    let reports = orchestrator
        .run_all(&mut store, &runner, "log", &[])
        .await
        .expect("run all");

    let targets: Vec<&str> = reports.iter().map(|report| report.target.as_str()).collect();
    assert_eq!(targets, vec!["one", "two"]);
    let called: Vec<String> = runner.calls().into_iter().map(|call| call.target).collect();
    assert_eq!(called, vec!["one", "two"]);
}

#[tokio::test]
async fn test_clean_forces_full_rerun() {
    let project = Project::new();
    let first = project.write("a.js", "a");
    let second = project.write("b.js", "b");
    let mut store = MemoryConfigStore::from_value(json!({
        "log": { "all": { "files": [first, second] } }
    }))
    .expect("valid tasks");
    let orchestrator = Orchestrator::new(project.options());
    let runner = RecordingRunner::new(Reply::Succeed);

    orchestrator
        .run(&mut store, &runner, "log", "all", &[])
        .await
        .expect("first run");
    assert!(
        hash_store::hash_dir(&project.options().cache, "log", "all").is_dir(),
        "hashes should be committed"
    );

    assert!(
        orchestrator
            .clean(Some("log"), Some("all"))
            .await
            .expect("clean")
    );
    assert!(!project.options().cache.join("log/all").exists());
    assert!(
        !orchestrator
            .clean(Some("log"), Some("all"))
            .await
            .expect("second clean")
    );

    let changed = orchestrator
        .changed_groups(&store, "log", "all")
        .await
        .expect("dry run");
    assert_eq!(changed[0].src, vec![first, second]);
}
