//! Integration tests for the `shop` binary.
//!
//! Every test runs the binary with `HOME` and `SHOP_CONFIG` pointed into a
//! temporary directory so the developer's own config and token are never
//! read.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A `shop` command isolated from the environment.
fn shop(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shop").unwrap();
    cmd.env("HOME", home.path())
        .env("SHOP_CONFIG", home.path().join("config.toml"))
        .env_remove("SHOP_ID")
        .env_remove("SHOP_API_BASE")
        .env_remove("SHOP_API_TOKEN")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_flag_works() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bulk exports"));
}

#[test]
fn version_flag_works() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shop"));
}

#[test]
fn export_without_shop_id_fails_with_hint() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .args(["export", "products"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No shop id"));
}

#[test]
fn export_without_token_fails_with_hint() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .args(["--shop-id", "42", "export", "products"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API token"));
}

#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();

    shop(&home)
        .args(["config", "set", "units.weight", "lb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set units.weight = lb"));

    shop(&home)
        .args(["config", "get", "units.weight"])
        .assert()
        .success()
        .stdout("lb\n");

    assert!(home.path().join("config.toml").exists());
}

#[test]
fn config_rejects_unknown_key() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .args(["config", "set", "color", "blue"])
        .assert()
        .failure();
}

#[test]
fn auth_stores_token_without_printing_it() {
    let home = TempDir::new().unwrap();

    shop(&home)
        .args(["auth", "--token", "tok_live_0123456789"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tok_live").not());

    shop(&home)
        .args(["auth", "--status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Token stored for")
                .and(predicate::str::contains("tok_live").not()),
        );
}

#[test]
fn completion_generates_script() {
    let home = TempDir::new().unwrap();
    shop(&home)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop"));
}

#[tokio::test(flavor = "multi_thread")]
async fn export_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/shops/42/products/export"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "sharded_task": { "id": "t1" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/shops/42/sharded_tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1",
            "is_done": true,
            "progress": { "percentage": 100.0 },
            "result_file": { "id": "f1" },
            "errors": [{ "message": "row 3: duplicate sku" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/shops/42/files/f1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "f1",
            "size": 8,
            "public_url": format!("{}/public/f1.csv", server.uri()),
            "name": "products.csv"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/f1.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"sku\nA-1\n".to_vec()))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let out = home.path().join("products.csv");

    let mut cmd = shop(&home);
    cmd.env("SHOP_API_TOKEN", "tok_test_0123456789")
        .args(["--shop-id", "42", "--no-progress"])
        .args(["--api-base", &format!("{}/v1", server.uri())])
        .args(["export", "products", "--out"])
        .arg(&out);

    // The binary blocks; keep the runtime free to serve its requests.
    let assert = tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap();
    assert.success().stdout(
        predicate::str::contains("Errors:\n  row 3: duplicate sku\n")
            .and(predicate::str::contains("Exported products")),
    );

    assert_eq!(std::fs::read(&out).unwrap(), b"sku\nA-1\n");
}
