use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use publisher_core::config::{ConfigManager, ConfigurationError};
use publisher_core::state_machine::StepName;

fn config_dir(yaml: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("publisher-config.yaml"), yaml).expect("write config");
    dir
}

const BASE: &str = r#"
retry:
  base_delay_seconds: 60
  max_attempts: 3
webhook:
  url: "https://hooks.example.com/base"
  secret: "base-secret"
enhancer:
  api_key: "sk-live"
  max_keywords: 8
test:
  retry:
    base_delay_seconds: 2
    step_overrides:
      webhook: 5
  webhook:
    intermediate_events: true
"#;

#[test]
fn test_environment_overrides_are_deep_merged() {
    let dir = config_dir(BASE);
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
    let config = manager.config();

    assert_eq!(manager.environment(), "test");
    assert_eq!(config.retry.base_delay_seconds, 2);
    assert_eq!(config.retry.max_attempts, 3, "untouched keys survive the merge");
    assert_eq!(config.retry.step_overrides.get(&StepName::Webhook), Some(&5));
    assert!(config.webhook.intermediate_events);
    assert_eq!(config.webhook.url.as_deref(), Some("https://hooks.example.com/base"));
    assert_eq!(config.enhancer.max_keywords, 8);
    // absent sections fall back to defaults
    assert_eq!(config.query.max_limit, 100);
}

#[test]
fn test_unknown_environment_uses_base_values() {
    let dir = config_dir(BASE);
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging").unwrap();

    assert_eq!(manager.config().retry.base_delay_seconds, 60);
    assert!(!manager.config().webhook.intermediate_events);
}

#[test]
fn test_environment_variables_are_expanded() {
    let var = "PUBLISHER_CORE_TEST_WEBHOOK_SECRET_EXPAND";
    std::env::set_var(var, "from-env");
    let dir = config_dir(&format!("webhook:\n  secret: \"${{{var}}}\"\n"));

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production").unwrap();
    assert_eq!(manager.config().webhook.secret.as_deref(), Some("from-env"));
}

#[test]
fn test_missing_environment_variable_is_an_error() {
    let dir = config_dir("webhook:\n  secret: \"${PUBLISHER_CORE_TEST_UNSET_VARIABLE}\"\n");

    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production")
        .unwrap_err();
    match err {
        ConfigurationError::EnvironmentVariableError { variable, .. } => {
            assert_eq!(variable, "PUBLISHER_CORE_TEST_UNSET_VARIABLE")
        }
        other => panic!("expected environment variable error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_lists_searched_paths() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    match err {
        ConfigurationError::ConfigFileNotFound { searched_paths } => {
            assert_eq!(searched_paths.len(), 2);
            assert!(searched_paths[0].ends_with("publisher-config.yaml"));
        }
        other => panic!("expected missing file error, got {other:?}"),
    }
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = config_dir("retry:\n  max_attempts: 0\n");
    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { ref field, .. } if field == "retry.max_attempts"));

    let dir = config_dir("retry: [not, a, mapping]\n");
    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidYaml { .. }));
}

#[test]
fn test_claim_lease_must_outlast_step_timeouts() {
    let dir = config_dir("execution:\n  claim_lease_seconds: 10\n");
    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::InvalidValue { ref field, ref value, .. }
            if field == "execution.claim_lease_seconds" && value == "10"
    ));

    // Equal to the longest call is still too short
    let dir = config_dir("execution:\n  claim_lease_seconds: 120\n");
    assert!(ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").is_err());

    let dir = config_dir(
        "execution:\n  claim_lease_seconds: 20\n  enhancement_timeout_seconds: 15\n  publication_timeout_seconds: 15\n  webhook_timeout_seconds: 5\n",
    );
    let manager = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
        .expect("lease longer than every timeout");
    assert_eq!(manager.config().execution.claim_lease_seconds, 20);
}

#[test]
fn test_debug_config_masks_secrets() {
    let dir = config_dir(BASE);
    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test").unwrap();
    let debug = manager.debug_config();

    assert_eq!(debug["webhook"]["secret"], "[MASKED]");
    assert_eq!(debug["enhancer"]["api_key"], "[MASKED]");
    assert_eq!(debug["enhancer"]["max_keywords"], 8);
    assert_eq!(debug["webhook"]["url"], "https://hooks.example.com/base");
}

#[test]
fn test_shipped_configuration_loads() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");

    let test = ConfigManager::load_from_directory_with_env(Some(dir.clone()), "test").unwrap();
    assert_eq!(test.config().retry.base_delay_seconds, 1);
    assert_eq!(test.config().execution.worker_concurrency, 4);

    let development = ConfigManager::load_from_directory_with_env(Some(dir), "development").unwrap();
    assert_eq!(development.config().retry.base_delay_seconds, 60);
    assert!(development.config().webhook.intermediate_events);
}
