#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

fn run_script(db_path: &std::path::Path, lines: &[String]) -> Vec<serde_json::Value> {
    let script = tempfile::NamedTempFile::new().unwrap();
    common::write_lines(script.path(), lines).unwrap();

    let mut cmd = Command::new(cargo_bin!("order-intake"));
    cmd.arg("carts")
        .arg(script.path())
        .arg("--store")
        .arg("document")
        .arg("--document-db-path")
        .arg(db_path);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: create a cart and add a line
    let first = run_script(
        &db_path,
        &[
            r#"{"op":"create","customer_id":42,"as":"c"}"#.to_string(),
            r#"{"op":"add","cart":"c","product_id":7,"quantity":2}"#.to_string(),
        ],
    );
    let cart_id = first[0]["result"]["shopping_cart_id"]
        .as_str()
        .unwrap()
        .to_string();

    // 2. Second run: the same token finds the cart, merges and checks out
    let second = run_script(
        &db_path,
        &[
            format!(r#"{{"op":"add","cart":"{cart_id}","product_id":7,"quantity":3}}"#),
            format!(r#"{{"op":"get","cart":"{cart_id}","items":true}}"#),
            format!(r#"{{"op":"checkout","cart":"{cart_id}"}}"#),
        ],
    );
    assert_eq!(second[1]["result"]["items"][0]["quantity"], 5);
    let order_id = second[2]["result"]["order_id"].as_str().unwrap().to_string();

    // 3. Third run: the order survived, the cart did not
    let third = run_script(
        &db_path,
        &[
            format!(r#"{{"op":"get_order","order":"{order_id}"}}"#),
            format!(r#"{{"op":"get","cart":"{cart_id}"}}"#),
        ],
    );
    assert_eq!(third[0]["result"]["total_amount"], "40.35");
    assert_eq!(third[1]["error"]["kind"], "not_found");
}
