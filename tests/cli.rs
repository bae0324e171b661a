//! CLI behavior that needs neither a database nor a bucket.

use assert_cmd::Command;
use predicates::prelude::*;
use table_export::ExportConfig;
use tempfile::TempDir;

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("table-export").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

fn with_env(cmd: &mut Command) -> &mut Command {
    cmd.env("DB_HOST", "localhost")
        .env("DB_USER", "exporter")
        .env("DB_PASSWORD", "secret")
        .env("DB_NAME", "shop")
        .env("GCS_BUCKET_NAME", "shop-exports")
        .env("EXPORT_TABLES", "users,orders")
}

#[test]
fn missing_environment_is_reported_in_one_error() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required environment variables: DB_HOST, DB_USER, DB_NAME, GCS_BUCKET_NAME",
        ));
}

#[test]
fn missing_environment_is_logged() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["--log-format", "json", "run"])
        .env("DB_HOST", "localhost")
        .assert()
        .failure()
        .stdout(predicate::str::contains("DB_USER"))
        .stdout(predicate::str::contains("DB_HOST").not());
}

#[test]
fn init_writes_a_loadable_config() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["init", "--output", "export.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created: export.toml"));

    let path = dir.path().join("export.toml");
    let config = ExportConfig::from_file(path.to_str().unwrap()).unwrap();
    assert_eq!(config.storage.bucket, "shop-exports");
    assert_eq!(config.tables.len(), 3);
}

#[test]
fn reset_removes_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoints = dir.path().join("timestamps");
    std::fs::create_dir_all(&checkpoints).unwrap();
    std::fs::write(checkpoints.join("orders_last_run.txt"), "2024-01-03T00:00:00").unwrap();

    with_env(&mut cli(&dir))
        .args(["reset", "--table", "orders", "--table", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders: checkpoint removed"))
        .stdout(predicate::str::contains("users: no checkpoint"));

    assert!(!checkpoints.join("orders_last_run.txt").exists());
}

#[test]
fn reset_rejects_unconfigured_table() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("x_last_run.txt"), "2024-01-03T00:00:00").unwrap();

    with_env(&mut cli(&dir))
        .args(["--quiet", "reset", "--table", "../x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown table: ../x"));

    assert!(dir.path().join("x_last_run.txt").exists());
}

#[test]
fn quiet_mode_still_reports_warnings() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["init", "--output", "export.toml"])
        .assert()
        .success();

    // The sample config has an empty password, which is logged as a warning.
    cli(&dir)
        .args(["--quiet", "--config", "export.toml", "reset", "--all"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No database password"));
}

#[test]
fn reset_requires_a_target() {
    let dir = TempDir::new().unwrap();

    with_env(&mut cli(&dir))
        .args(["--quiet", "reset"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--all"));
}

#[test]
fn unknown_table_filter_is_rejected() {
    let dir = TempDir::new().unwrap();

    with_env(&mut cli(&dir))
        .args(["--quiet", "--tables", "orders,invoices", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown table: invoices"));
}

#[test]
fn reports_version() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
