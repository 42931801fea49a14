//! Integration tests for the CLI route table

use plotweave::cli::{Cli, RunContext};
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

async fn run_context(workspace: &Path, store: &str) -> RunContext {
    let config = workspace.join("plotweave.toml");
    if !config.exists() {
        fs::write(&config, "[session]\ndefault_layout = \"cli\"\n").unwrap();
    }
    RunContext::new(
        workspace.to_path_buf(),
        Some(config),
        Some(workspace.join(store)),
    )
    .await
    .unwrap()
}

async fn run(ctx: &RunContext, args: &[&str]) -> anyhow::Result<String> {
    let mut argv = vec!["plotweave"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command).await
}

#[tokio::test]
async fn test_status_json_reports_session() {
    let temp = TempDir::new().unwrap();
    let ctx = run_context(temp.path(), "store").await;
    let out = run(&ctx, &["status", "--format", "json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value["session_id"].as_str(),
        ctx.manager().session_id().as_ref().map(|id| id.as_str())
    );
    assert_eq!(value["stats"]["counts"]["session"], 1);
}

#[tokio::test]
async fn test_export_then_import_into_another_store() {
    let temp = TempDir::new().unwrap();
    let bundle_path = temp.path().join("bundle.json");
    let bundle_arg = bundle_path.to_string_lossy().to_string();

    let source_session = {
        let source = run_context(temp.path(), "source").await;
        let out = run(&source, &["export", "--output", &bundle_arg]).await.unwrap();
        assert!(out.starts_with("Exported 1 context(s)"), "got {}", out);
        source.manager().session_id().unwrap()
    };

    let target = run_context(temp.path(), "target").await;
    let backup = temp.path().join("backup.json");
    let backup_arg = backup.to_string_lossy().to_string();
    let out = run(&target, &["import", &bundle_arg, "--backup-file", &backup_arg])
        .await
        .unwrap();
    assert!(out.contains("1 created"), "got {}", out);
    assert!(backup.exists());

    let listed = run(&target, &["list", "--type", "session", "--format", "json"])
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&listed).unwrap();
    assert_eq!(value["total"], 2);
    assert!(listed.contains(source_session.as_str()));
}

#[tokio::test]
async fn test_show_missing_context_fails() {
    let temp = TempDir::new().unwrap();
    let ctx = run_context(temp.path(), "store").await;
    let err = run(&ctx, &["show", "story", "nope"]).await.unwrap_err();
    assert!(format!("{:#}", err).contains("not found"));
}

#[tokio::test]
async fn test_migrate_dry_run_prints_log() {
    let temp = TempDir::new().unwrap();
    let ctx = run_context(temp.path(), "store").await;
    let legacy = temp.path().join("legacy.json");
    fs::write(&legacy, r#"{"plotPoint": "A storm"}"#).unwrap();
    let legacy_arg = legacy.to_string_lossy().to_string();

    let out = run(&ctx, &["migrate", "any-story", &legacy_arg, "--dry-run"])
        .await
        .unwrap();
    assert!(out.contains("Current phase: plotOutline"), "got {}", out);
    assert!(out.ends_with("Dry run: nothing stored."));
}

#[tokio::test]
async fn test_cleanup_without_retention_is_noop() {
    let temp = TempDir::new().unwrap();
    let ctx = run_context(temp.path(), "store").await;
    let out = run(&ctx, &["cleanup"]).await.unwrap();
    assert!(out.starts_with("No retention configured"));
}
