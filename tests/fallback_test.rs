mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn create_script() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    common::write_lines(
        file.path(),
        &[r#"{"op":"create","customer_id":1}"#.to_string()],
    )
    .unwrap();
    file
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let script = create_script();

    let mut cmd = Command::new(cargo_bin!("order-intake"));
    cmd.env_remove("RUST_LOG")
        .arg("carts")
        .arg(script.path())
        .arg("--store")
        .arg("document")
        .arg("--document-db-path")
        .arg("some_db");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("shopping_cart_id"))
        .stderr(predicate::str::contains(
            "'storage-rocksdb' feature is not enabled. Falling back to in-memory tables.",
        ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let script = create_script();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("order-intake"));
    cmd.env_remove("RUST_LOG")
        .arg("carts")
        .arg(script.path())
        .arg("--store")
        .arg("document")
        .arg("--document-db-path")
        .arg(&db_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("WARN").not());
}
