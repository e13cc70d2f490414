//! Create/read/update/delete of a single session against real processes.

use doom_provider::{Error, ReadOutcome, SessionConfig, SessionModel, IWAD_FLAG};

use crate::fixture::{kill_externally, pid_exists, sleeper, wait_for_exit};

fn expect_present(outcome: ReadOutcome) -> SessionModel {
    match outcome {
        ReadOutcome::Present(state) => state,
        other => panic!("expected the session to be present, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_then_read_is_stable() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    let pid = state.pid.expect("create must record a pid");
    assert!(pid_exists(pid));

    let refreshed = expect_present(resource.read(&state).await);
    assert_eq!(refreshed, state);
    let refreshed = expect_present(resource.read(&refreshed).await);
    assert_eq!(refreshed.pid, Some(pid));

    resource.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_launch_arguments() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource
        .create(&SessionConfig::new("freedoom1.wad"))
        .await
        .unwrap();
    assert_eq!(fixture.launch_args(), vec![IWAD_FLAG, "freedoom1.wad"]);

    resource.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_session_runs_in_its_own_process_group() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    let pid = state.pid.unwrap();

    let pgid = unsafe { libc::getpgid(pid as libc::pid_t) };
    assert_eq!(pgid, pid as libc::pid_t);
    assert_ne!(pgid, unsafe { libc::getpgrp() });

    resource.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_external_kill_is_drift() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    kill_externally(state.pid.unwrap());

    assert!(matches!(resource.read(&state).await, ReadOutcome::Removed));
}

#[tokio::test]
async fn test_delete_after_external_kill_succeeds() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    kill_externally(state.pid.unwrap());

    resource.delete(&state).await.unwrap();
    // Deleting twice is still fine
    resource.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_delete_running_session() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    let pid = state.pid.unwrap();

    resource.delete(&state).await.unwrap();
    assert!(wait_for_exit(pid));
    assert!(matches!(resource.read(&state).await, ReadOutcome::Removed));
}

#[tokio::test]
async fn test_update_always_fails() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    for planned in ["x", "y"] {
        let err = resource
            .update(&state, &SessionConfig::new(planned))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }

    // The running session is untouched
    assert_eq!(expect_present(resource.read(&state).await), state);
    resource.delete(&state).await.unwrap();
}

#[tokio::test]
async fn test_sleeper_scenario() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let state = resource.create(&SessionConfig::new("x")).await.unwrap();
    let p = state.pid.unwrap();

    let read = expect_present(resource.read(&state).await);
    assert_eq!(
        read,
        SessionModel {
            wad: "x".to_string(),
            pid: Some(p),
        }
    );

    resource.delete(&read).await.unwrap();
    assert!(wait_for_exit(p));
    assert!(!pid_exists(p));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_are_independent() {
    let fixture = sleeper();
    let resource = fixture.resource();

    let mut tasks = Vec::new();
    for i in 0..4 {
        let resource = resource.clone();
        tasks.push(tokio::spawn(async move {
            resource
                .create(&SessionConfig::new(format!("map{:02}.wad", i)))
                .await
        }));
    }

    let mut states = Vec::new();
    for task in tasks {
        states.push(task.await.unwrap().unwrap());
    }

    let mut pids: Vec<i32> = states.iter().filter_map(|s| s.pid).collect();
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 4);

    for state in &states {
        expect_present(resource.read(state).await);
        resource.delete(state).await.unwrap();
    }
    for pid in pids {
        assert!(wait_for_exit(pid));
    }
}

#[tokio::test]
async fn test_session_outlives_the_resource() {
    let fixture = sleeper();
    let state = {
        let resource = fixture.resource();
        resource.create(&SessionConfig::new("x")).await.unwrap()
    };
    let pid = state.pid.unwrap();

    let crate::fixture::Fixture { dir, data } = fixture;
    drop(data);
    assert!(pid_exists(pid));

    // A fresh configuration can still reach and stop it
    let fixture = crate::fixture::Fixture {
        data: doom_provider::DoomProvider::new("test")
            .configure(&doom_provider::ProviderConfig::new(
                dir.path().join("doom").to_str().unwrap(),
            ))
            .unwrap(),
        dir,
    };
    fixture.resource().delete(&state).await.unwrap();
    assert!(wait_for_exit(pid));
}

#[tokio::test]
async fn test_create_fails_when_executable_disappears() {
    let fixture = sleeper();
    std::fs::remove_file(fixture.executable()).unwrap();

    let err = fixture
        .resource()
        .create(&SessionConfig::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Launch(_)));
    assert!(err.to_string().contains("No such file"), "{}", err);
}
