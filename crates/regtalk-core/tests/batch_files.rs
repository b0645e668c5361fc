//! Tests for batch files named inside a batch

use regtalk_core::batch::{parse, AliasTable, BatchError, Command, DirResolver};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn test_file_with_txt_extension() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "warmup.txt",
        "# warm up the target\nw 10 1\r\ndelay=0\nr 10\n",
    );

    let resolver = DirResolver::new(dir.path());
    let batch = parse("warmup; r 602b", &AliasTable::new(), &resolver).unwrap();

    assert_eq!(
        batch.commands(),
        &[
            Command::Write {
                address: 0x10,
                value: 1
            },
            Command::Delay { seconds: 0.0 },
            Command::Read { address: 0x10 },
            Command::Read { address: 0x602B },
        ]
    );
    assert_eq!(batch.comments(), &["warm up the target".to_string()]);
}

#[test]
fn test_file_names_alias_and_other_file() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "outer", "status; inner");
    write_file(dir.path(), "inner.txt", "r 2");

    let aliases: AliasTable = [("status", "r 1")].into_iter().collect();
    let resolver = DirResolver::new(dir.path());
    let batch = parse("outer", &aliases, &resolver).unwrap();

    assert_eq!(
        batch.commands(),
        &[Command::Read { address: 1 }, Command::Read { address: 2 }]
    );
}

#[test]
fn test_file_cycle_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.txt", "r 1; b");
    write_file(dir.path(), "b.txt", "a");

    let resolver = DirResolver::new(dir.path());
    let err = parse("a", &AliasTable::new(), &resolver).unwrap_err();
    assert!(matches!(err, BatchError::AliasFileCycle { .. }));
}

#[test]
fn test_alias_file_cycle_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "poll.txt", "r 1; again");

    let aliases: AliasTable = [("again", "poll")].into_iter().collect();
    let resolver = DirResolver::new(dir.path());
    assert!(matches!(
        parse("poll", &aliases, &resolver),
        Err(BatchError::AliasFileCycle { .. })
    ));
}

#[test]
fn test_bad_token_inside_file_rejects_batch() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "broken.txt", "r 1\nbogus\n");

    let resolver = DirResolver::new(dir.path());
    assert_eq!(
        parse("r 2; broken", &AliasTable::new(), &resolver).unwrap_err(),
        BatchError::BadToken("bogus".into())
    );
}

#[test]
fn test_directory_is_not_a_batch_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("r 1")).unwrap();

    let resolver = DirResolver::new(dir.path());
    let batch = parse("r 1", &AliasTable::new(), &resolver).unwrap();
    assert_eq!(batch.commands(), &[Command::Read { address: 1 }]);
}
