// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chatty_core::{GroupId, UserId};

fn user_create(id: u64, name: &str) -> Operation {
    Operation::UserCreate {
        id: UserId(id),
        username: name.to_string(),
        email: format!("{}@example.com", name),
    }
}

#[test]
fn wal_append_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");

    // Write operations
    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&user_create(1, "ada")).unwrap();
        wal.append(&Operation::FriendAdd {
            user_id: UserId(1),
            friend_id: UserId(2),
        })
        .unwrap();
    }

    // Read back
    let ops = Wal::replay(&path).unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0], user_create(1, "ada"));
    assert!(matches!(ops[1], Operation::FriendAdd { .. }));
}

#[test]
fn wal_sequence_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");

    // First session
    {
        let mut wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 0);
        assert_eq!(wal.append(&Operation::GroupDelete { id: GroupId(1) }).unwrap(), 1);
        assert_eq!(wal.sequence(), 1);
    }

    // Second session - sequence should continue
    {
        let mut wal = Wal::open(&path).unwrap();
        assert_eq!(wal.sequence(), 1);
        assert_eq!(wal.append(&Operation::GroupDelete { id: GroupId(2) }).unwrap(), 2);
    }
}

#[test]
fn wal_entries_are_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");

    let mut wal = Wal::open(&path).unwrap();
    wal.append(&Operation::GroupDelete { id: GroupId(4) }).unwrap();
    assert_eq!(wal.path(), path.as_path());

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "{\"seq\":1,\"op\":{\"GroupDelete\":{\"id\":4}}}\n");
}

#[test]
fn wal_replay_nonexistent() {
    let path = Path::new("/nonexistent/path/wal");
    let ops = Wal::replay(path).unwrap();
    assert!(ops.is_empty());
}

#[test]
fn wal_replay_skips_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    std::fs::write(
        &path,
        "{\"seq\":1,\"op\":{\"GroupDelete\":{\"id\":1}}}\n\n{\"seq\":2,\"op\":{\"GroupDelete\":{\"id\":2}}}\n",
    )
    .unwrap();

    assert_eq!(Wal::replay(&path).unwrap().len(), 2);
}

#[test]
fn torn_tail_is_ignored_and_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    std::fs::write(
        &path,
        "{\"seq\":1,\"op\":{\"GroupDelete\":{\"id\":1}}}\n{\"seq\":2,\"op\":{\"Grou",
    )
    .unwrap();

    assert_eq!(Wal::replay(&path).unwrap().len(), 1);

    let mut wal = Wal::open(&path).unwrap();
    assert_eq!(wal.sequence(), 1);
    wal.append(&Operation::GroupDelete { id: GroupId(3) }).unwrap();
    drop(wal);

    let ops = Wal::replay(&path).unwrap();
    assert_eq!(
        ops,
        vec![
            Operation::GroupDelete { id: GroupId(1) },
            Operation::GroupDelete { id: GroupId(3) },
        ]
    );
}

#[test]
fn corruption_before_the_tail_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    std::fs::write(
        &path,
        "not json\n{\"seq\":2,\"op\":{\"GroupDelete\":{\"id\":2}}}\n",
    )
    .unwrap();

    let err = Wal::replay(&path).unwrap_err();
    assert!(matches!(err, WalError::Corrupt { line: 1, .. }));
    assert!(Wal::open(&path).is_err());
}

#[test]
fn rollback_discards_a_partial_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    let mut wal = Wal::open(&path).unwrap();
    wal.append(&user_create(1, "ada")).unwrap();

    // a write that died halfway through its line
    wal.file.write_all(b"{\"seq\":2,\"op\":{\"Us").unwrap();
    wal.rollback();

    assert_eq!(wal.append(&user_create(2, "grace")).unwrap(), 2);
    wal.append(&user_create(3, "linus")).unwrap();
    drop(wal);

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.sequence(), 3);
    assert_eq!(
        Wal::replay(&path).unwrap(),
        vec![
            user_create(1, "ada"),
            user_create(2, "grace"),
            user_create(3, "linus"),
        ]
    );
}

#[test]
fn unacknowledged_entry_is_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    let mut wal = Wal::open(&path).unwrap();

    // written in full but never acknowledged, as when the sync fails
    wal.file
        .write_all(b"{\"seq\":1,\"op\":{\"GroupDelete\":{\"id\":9}}}\n")
        .unwrap();
    wal.rollback();
    wal.append(&Operation::GroupDelete { id: GroupId(1) }).unwrap();
    drop(wal);

    assert_eq!(
        Wal::replay(&path).unwrap(),
        vec![Operation::GroupDelete { id: GroupId(1) }]
    );
}

#[test]
fn failed_rollback_is_repaired_by_the_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatty.wal");
    let mut wal = Wal::open(&path).unwrap();
    wal.append(&user_create(1, "ada")).unwrap();

    wal.file.write_all(b"garbage").unwrap();
    wal.needs_repair = true;
    wal.append(&user_create(2, "grace")).unwrap();
    drop(wal);

    assert_eq!(Wal::replay(&path).unwrap().len(), 2);
}
