// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chatty_core::Topic;
use tempfile::tempdir;

fn test_config(state_dir: &std::path::Path) -> Config {
    Config::from_parts(&ChattyConfig::default(), state_dir.to_path_buf(), None).unwrap()
}

#[test]
fn from_parts_lays_out_state_dir() {
    let config = test_config(std::path::Path::new("/var/chatty"));

    assert_eq!(config.socket_path, PathBuf::from("/var/chatty/chatty.sock"));
    assert_eq!(config.lock_path, PathBuf::from("/var/chatty/daemon.pid"));
    assert_eq!(config.version_path, PathBuf::from("/var/chatty/daemon.version"));
    assert_eq!(config.log_path, PathBuf::from("/var/chatty/daemon.log"));
    assert_eq!(config.wal_path, PathBuf::from("/var/chatty/wal/chatty.wal"));
    assert_eq!(config.log_level, "info");
    assert!(config.policy.excludes_self(Topic::MessageAdded));
}

#[test]
fn from_parts_honors_explicit_socket_and_policy() {
    let settings = ChattyConfig::from_toml_str(
        r#"
        [policy.exclude_self]
        group-added = false
        "#,
    )
    .unwrap();
    let config = Config::from_parts(
        &settings,
        PathBuf::from("/var/chatty"),
        Some(PathBuf::from("/run/chatty.sock")),
    )
    .unwrap();

    assert_eq!(config.socket_path, PathBuf::from("/run/chatty.sock"));
    assert!(!config.policy.excludes_self(Topic::GroupAdded));
    assert!(config.policy.excludes_self(Topic::MessageAdded));
}

#[tokio::test]
async fn startup_creates_files_and_shutdown_removes_them() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let mut daemon = startup(&config).await.unwrap();

    assert!(config.socket_path.exists());
    assert!(config.wal_path.parent().unwrap().is_dir());
    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        env!("CARGO_PKG_VERSION")
    );

    daemon.shutdown().await.unwrap();

    assert!(daemon.ctx.shutdown_requested());
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn second_daemon_fails_to_lock_and_leaves_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let _daemon = startup(&config).await.unwrap();
    let second = startup(&config).await;

    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());
}

#[tokio::test]
async fn startup_replays_wal_from_previous_run() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let mut daemon = startup(&config).await.unwrap();
        let service = &daemon.ctx.service;
        let ada = service.create_user("ada", "ada@example.com").unwrap().id;
        let grace = service.create_user("grace", "grace@example.com").unwrap().id;
        service.add_friend(ada, grace).unwrap();
        let group = service.create_group(ada, "lab", &[grace]).unwrap().id;
        service.create_message(grace, group, "hello").unwrap();
        daemon.shutdown().await.unwrap();
    }

    let daemon = startup(&config).await.unwrap();
    let stats = daemon.ctx.service.stats();

    assert_eq!(stats.users, 2);
    assert_eq!(stats.groups, 1);
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.wal_sequence, 5);
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.socket_path, b"stale").unwrap();

    let _daemon = startup(&config).await.unwrap();

    let meta = std::fs::symlink_metadata(&config.socket_path).unwrap();
    assert!(!meta.is_file());
}

#[tokio::test]
async fn corrupt_wal_fails_startup_and_cleans_up() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(config.wal_path.parent().unwrap()).unwrap();
    std::fs::write(&config.wal_path, "not json\n{\"seq\":2,\"op\":{\"GroupDelete\":{\"id\":1}}}\n")
        .unwrap();

    let result = startup(&config).await;

    assert!(matches!(result, Err(LifecycleError::Wal(_))));
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}
