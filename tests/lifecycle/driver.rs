//! Plan/apply cycles through the local driver and a state file.

use doom_provider::{Action, Driver, SessionConfig, StateStore};

use crate::fixture::{kill_externally, pid_exists, sleeper, wait_for_exit, Fixture};

fn driver(fixture: &Fixture) -> Driver {
    let store = StateStore::new(fixture.dir.path().join("state.json"));
    Driver::new(fixture.resource(), store)
}

#[tokio::test]
async fn test_apply_is_idempotent() {
    let fixture = sleeper();
    let driver = driver(&fixture);
    let config = SessionConfig::new("freedoom1.wad");

    let first = driver.apply("main", Some(&config)).await.unwrap();
    assert_eq!(first.action, Action::Create);
    let pid = first.state.as_ref().and_then(|s| s.pid).unwrap();

    let second = driver.apply("main", Some(&config)).await.unwrap();
    assert_eq!(second.action, Action::NoOp);
    assert_eq!(second.state, first.state);
    assert_eq!(driver.store().get("main").unwrap(), first.state);

    let destroyed = driver.destroy("main").await.unwrap();
    assert_eq!(destroyed.action, Action::Delete);
    assert!(wait_for_exit(pid));
}

#[tokio::test]
async fn test_changed_wad_replaces_session() {
    let fixture = sleeper();
    let driver = driver(&fixture);

    let first = driver
        .apply("main", Some(&SessionConfig::new("freedoom1.wad")))
        .await
        .unwrap();
    let old_pid = first.state.unwrap().pid.unwrap();

    let config = SessionConfig::new("freedoom2.wad");
    assert_eq!(
        driver.plan("main", Some(&config)).await.unwrap(),
        Action::Replace {
            attributes: vec!["wad".to_string()]
        }
    );

    let second = driver.apply("main", Some(&config)).await.unwrap();
    let state = second.state.unwrap();
    assert_eq!(state.wad, "freedoom2.wad");
    assert_ne!(state.pid, Some(old_pid));
    assert!(wait_for_exit(old_pid));
    assert!(pid_exists(state.pid.unwrap()));

    driver.destroy("main").await.unwrap();
}

#[tokio::test]
async fn test_drift_is_healed_on_next_apply() {
    let fixture = sleeper();
    let driver = driver(&fixture);
    let config = SessionConfig::new("freedoom1.wad");

    let first = driver.apply("main", Some(&config)).await.unwrap();
    kill_externally(first.state.unwrap().pid.unwrap());

    assert!(driver.refresh("main").await.unwrap().is_none());
    assert!(driver.store().get("main").unwrap().is_none());
    assert_eq!(driver.plan("main", Some(&config)).await.unwrap(), Action::Create);

    let healed = driver.apply("main", Some(&config)).await.unwrap();
    assert_eq!(healed.action, Action::Create);
    assert!(pid_exists(healed.state.unwrap().pid.unwrap()));

    driver.destroy("main").await.unwrap();
}

#[tokio::test]
async fn test_destroy_without_state_is_noop() {
    let fixture = sleeper();
    let driver = driver(&fixture);

    let report = driver.destroy("main").await.unwrap();
    assert_eq!(report.action, Action::NoOp);
    assert!(report.state.is_none());
}

#[tokio::test]
async fn test_destroy_after_external_kill() {
    let fixture = sleeper();
    let driver = driver(&fixture);

    let first = driver
        .apply("main", Some(&SessionConfig::new("freedoom1.wad")))
        .await
        .unwrap();
    kill_externally(first.state.unwrap().pid.unwrap());

    // Refresh already dropped the session, so there is nothing left to kill
    let report = driver.destroy("main").await.unwrap();
    assert_eq!(report.action, Action::NoOp);
    assert!(driver.store().get("main").unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_all_drops_only_dead_sessions() {
    let fixture = sleeper();
    let driver = driver(&fixture);

    let alive = driver
        .apply("alive", Some(&SessionConfig::new("a.wad")))
        .await
        .unwrap()
        .state
        .unwrap();
    let dead = driver
        .apply("dead", Some(&SessionConfig::new("b.wad")))
        .await
        .unwrap()
        .state
        .unwrap();
    kill_externally(dead.pid.unwrap());

    let sessions = driver.refresh_all().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions.get("alive"), Some(&alive));

    driver.destroy("alive").await.unwrap();
    assert!(driver.store().load().unwrap().resources.is_empty());
}
