//! Integration tests for the LauncherApi public interface.
//!
//! These tests drive the API against the real process table and file
//! system.

use launchkit::{AppId, ErrorKind, JsonPathStore, LauncherApi, MemoryPathStore, PathStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn api_with(store: impl PathStore + 'static) -> LauncherApi {
    LauncherApi::builder(Arc::new(store))
        .grace_period(Duration::from_secs(2))
        .build()
}

fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    check()
}

#[test]
fn test_unset_path() {
    let api = api_with(MemoryPathStore::new());

    let result = api.launch(AppId::NeuroSongSpider);
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidTarget));

    assert!(!api.is_running(AppId::NeuroSongSpider));
    assert_eq!(
        api.usage(AppId::NeuroSongSpider).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        api.kill(AppId::NeuroSongSpider).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        api.folder_size(AppId::NeuroSongSpider).unwrap_err().kind(),
        ErrorKind::InvalidTarget
    );
    assert_eq!(
        api.version(AppId::NeuroSongSpider).unwrap_err().kind(),
        ErrorKind::InvalidTarget
    );
}

#[test]
fn test_missing_executable_is_invalid_target() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.exe");
    let api = api_with(MemoryPathStore::new().with_path(AppId::Evz, missing.to_string_lossy()));

    let result = api.launch(AppId::Evz);
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidTarget));
    assert!(!api.is_running(AppId::Evz));
}

#[test]
fn test_paths_persist_through_api() {
    let temp_dir = TempDir::new().unwrap();
    {
        let api = api_with(JsonPathStore::open(temp_dir.path()).unwrap());
        api.set_path(AppId::Neurolings, r"C:\The-Neuroling-Collection\Neurolings.exe")
            .unwrap();
    }

    let api = api_with(JsonPathStore::open(temp_dir.path()).unwrap());
    assert_eq!(
        api.path(AppId::Neurolings),
        r"C:\The-Neuroling-Collection\Neurolings.exe"
    );
    assert_eq!(api.path(AppId::Evz), "");
}

#[test]
fn test_folder_size_of_configured_app() {
    let temp_dir = TempDir::new().unwrap();
    let exe = temp_dir.path().join("Game.exe");
    std::fs::write(&exe, vec![0u8; 4096]).unwrap();
    std::fs::write(temp_dir.path().join("assets.pak"), vec![0u8; 1024]).unwrap();
    let api = api_with(MemoryPathStore::new().with_path(AppId::Evz, exe.to_string_lossy()));

    let report = api.folder_size(AppId::Evz).unwrap();
    assert_eq!(report.total_bytes, 5120);
    assert_eq!(report.file_count, 2);
}

#[cfg(unix)]
#[test]
fn test_run_blocking_captures_output() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let exe = temp_dir.path().join("report.sh");
    std::fs::write(&exe, "#!/bin/sh\npwd\nexit 0\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    let api = api_with(MemoryPathStore::new().with_path(AppId::Evz, exe.to_string_lossy()));

    let output = api.run_blocking(AppId::Evz).unwrap();
    assert!(output.success());
    let expected = temp_dir.path().canonicalize().unwrap();
    let reported = std::path::PathBuf::from(output.stdout.trim())
        .canonicalize()
        .unwrap();
    assert_eq!(reported, expected);
}

/// Full lifecycle against a real detached process: launch, observe, measure,
/// terminate, and terminate again.
#[cfg(unix)]
#[test]
fn test_process_lifecycle() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    // Longer than the 15 characters Linux keeps of a process name
    let name = format!("launchkit-lifecycle-worker-{}.sh", std::process::id());
    let exe = temp_dir.path().join(&name);
    std::fs::write(&exe, "#!/bin/sh\nwhile true; do sleep 1; done\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

    let api = api_with(
        MemoryPathStore::new().with_path(AppId::NeuroSongSpider, exe.to_string_lossy()),
    );

    let result = api.launch(AppId::NeuroSongSpider);
    assert!(result.success, "{}", result.message);
    assert!(
        eventually(Duration::from_secs(5), || api.is_running(AppId::NeuroSongSpider)),
        "{} never showed up in the process table",
        name
    );

    let usage = api.usage(AppId::NeuroSongSpider).unwrap();
    assert!(usage.count >= 1);
    assert_eq!(
        usage.total_memory_bytes,
        usage.processes.iter().map(|p| p.memory_bytes).sum::<u64>()
    );

    let report = api.kill(AppId::NeuroSongSpider).unwrap();
    assert!(report.killed >= 1);
    assert_eq!(report.failed, 0);
    assert!(eventually(Duration::from_secs(3), || !api
        .is_running(AppId::NeuroSongSpider)));

    let err = api.kill(AppId::NeuroSongSpider).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
