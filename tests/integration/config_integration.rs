//! Integration tests for layered configuration loading

use super::test_utils::with_isolated_env;
use plotweave::config::ConfigLoader;
use plotweave::logging::LogFormat;
use std::fs;
use tempfile::TempDir;

fn write_workspace_config(workspace: &std::path::Path, name: &str, body: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let config = ConfigLoader::load(&workspace).unwrap();
        assert!(config.storage.path.is_absolute());
        assert_eq!(config.storage.quota_bytes, None);
        assert_eq!(config.storage.max_history_versions, 10);
        assert_eq!(config.logging.level, "warn");
    });
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let global = ConfigLoader::global_config_path().unwrap();
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[storage]\nretention_days = 30\nmax_history_versions = 4\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let workspace = test_dir.path().join("ws");
        write_workspace_config(
            &workspace,
            "config.toml",
            "[storage]\npath = \"data/store\"\nretention_days = 7\n",
        );

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.storage.retention_days, Some(7));
        assert_eq!(config.storage.max_history_versions, 4);
        assert_eq!(config.storage.path, workspace.join("data/store"));
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_env_specific_file_and_env_vars_win() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        write_workspace_config(&workspace, "config.toml", "[session]\ndefault_layout = \"split\"\n");
        write_workspace_config(&workspace, "staging.toml", "[session]\ndefault_layout = \"focus\"\n");
        std::env::set_var("PLOTWEAVE_ENV", "staging");
        std::env::set_var("PLOTWEAVE__STORAGE__QUOTA_BYTES", "65536");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.session.default_layout, "focus");
        assert_eq!(config.storage.quota_bytes, Some(65536));
    });
}

#[test]
fn test_invalid_values_are_reported() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        write_workspace_config(
            &workspace,
            "config.toml",
            "[storage]\nquota_bytes = 0\n[logging]\nlevel = \"chatty\"\n",
        );
        let err = ConfigLoader::load(&workspace).unwrap_err().to_string();
        assert!(err.contains("chatty"), "unexpected error: {}", err);
    });
}
