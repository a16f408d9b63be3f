use faas_shell::{ShellCommand, ShellError};
use std::time::{Duration, Instant};

// --- Exit status ---

#[tokio::test]
async fn non_zero_exit_is_an_error_with_stderr() {
    let err = ShellCommand::new("echo boom >&2; exit 3")
        .run()
        .await
        .unwrap_err();
    match err {
        ShellError::NonZeroExit { code, stderr, .. } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr.trim(), "boom");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn non_zero_exit_message_names_the_code() {
    let err = ShellCommand::new("exit 7").run().await.unwrap_err();
    assert!(err.to_string().contains("code 7"), "{err}");
}

// --- Timeout ---

#[tokio::test]
async fn timeout_kills_and_is_distinct_from_exit() {
    let started = Instant::now();
    let err = ShellCommand::new("sleep 5")
        .timeout(Duration::from_millis(200))
        .run()
        .await
        .unwrap_err();
    assert!(
        matches!(err, ShellError::Timeout { after, .. } if after == Duration::from_millis(200)),
        "{err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn timeout_covers_output_held_open_by_a_background_process() {
    let started = Instant::now();
    let err = ShellCommand::new("sleep 4 & echo hi")
        .timeout(Duration::from_millis(300))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ShellError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
}

#[tokio::test]
async fn timeout_kills_processes_the_command_started() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("sleeper.pid");
    let err = ShellCommand::new("sleep 30 & echo $! > sleeper.pid; wait")
        .current_dir(dir.path())
        .timeout(Duration::from_millis(300))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ShellError::Timeout { .. }), "{err:?}");

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let stat = format!("/proc/{}/stat", pid.trim());
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        // Gone, or a zombie waiting on its new parent.
        let alive = match std::fs::read_to_string(&stat) {
            Ok(line) => !line.contains(") Z "),
            Err(_) => false,
        };
        if !alive {
            break;
        }
        assert!(Instant::now() < deadline, "sleep {} survived the timeout", pid.trim());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn fast_command_beats_its_timeout() {
    let out = ShellCommand::new("echo quick")
        .timeout(Duration::from_secs(5))
        .run()
        .await
        .unwrap();
    assert_eq!(out.stdout, "quick\n");
}

// --- Working directory ---

#[tokio::test]
async fn runs_in_the_given_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
    let out = ShellCommand::new("cat marker.txt")
        .current_dir(dir.path())
        .run()
        .await
        .unwrap();
    assert_eq!(out.stdout.trim(), "here");
}

#[tokio::test]
async fn missing_directory_fails_to_spawn() {
    let err = ShellCommand::new("true")
        .current_dir("/definitely/not/a/dir")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, ShellError::Spawn { .. }), "{err:?}");
}
