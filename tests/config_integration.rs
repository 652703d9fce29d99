use pipeline_restrictor::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;

const BIN: &str = "pipeline-restrictor";

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        env::remove_var("PR_SERVER__PORT");
        env::remove_var("PR_CONTROL_PLANE__CALL_TIMEOUT_SECS");
        env::remove_var("PR_ADMISSION__ENFORCE_CANCELLATION_BLOCKS_ADMISSION");
        env::remove_var("CONFIG_FILE");
        env::remove_var("PORT");
        env::remove_var("KUBE_API_URL");
        env::remove_var("ENFORCE_CANCELLATION_BLOCKS_ADMISSION");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args([BIN]).expect("defaults should load");
    assert_eq!(config.server.port, 8443);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.control_plane.call_timeout_secs, 5);
    assert!(!config.control_plane.insecure_skip_tls_verify);
    assert_eq!(
        config.control_plane.token_file.as_deref(),
        Some("/var/run/secrets/kubernetes.io/serviceaccount/token")
    );
    assert_eq!(config.pipeline_runs.group, "tekton.dev");
    assert_eq!(config.pipeline_runs.version, "v1beta1");
    assert_eq!(config.pipeline_runs.resource, "pipelineruns");
    assert!(!config.admission.enforce_cancellation_blocks_admission);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("PR_SERVER__PORT", "9090");
        env::set_var("PR_CONTROL_PLANE__CALL_TIMEOUT_SECS", "2");
        env::set_var("PR_ADMISSION__ENFORCE_CANCELLATION_BLOCKS_ADMISSION", "true");
    }

    let config = AppConfig::load_from_args([BIN]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.control_plane.call_timeout_secs, 2);
    assert!(config.admission.enforce_cancellation_blocks_admission);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("restrictor.yaml");
    fs::write(
        &file_path,
        r"
server:
  port: 7070
control_plane:
  api_url: http://127.0.0.1:8001
pipeline_runs:
  version: v1
",
    )
    .expect("Failed to write temp config");

    let config =
        AppConfig::load_from_args([BIN, "--config", file_path.to_str().unwrap()])
            .expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.control_plane.api_url, "http://127.0.0.1:8001");
    assert_eq!(config.pipeline_runs.version, "v1");
    assert_eq!(config.pipeline_runs.group, "tekton.dev");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args([BIN, "--config", "/nonexistent/restrictor.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("PR_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args([
        BIN,
        "--port",
        "6060",
        "--api-url",
        "http://localhost:8001",
        "--enforce-cancellation-blocks-admission",
        "true",
    ])
    .expect("Failed to load config");
    assert_eq!(config.server.port, 6060);
    assert_eq!(config.control_plane.api_url, "http://localhost:8001");
    assert!(config.admission.enforce_cancellation_blocks_admission);

    clear_env_vars();
}

#[test]
#[serial]
fn test_zero_call_timeout_is_rejected() {
    clear_env_vars();
    unsafe {
        env::set_var("PR_CONTROL_PLANE__CALL_TIMEOUT_SECS", "0");
    }

    let err = AppConfig::load_from_args([BIN]).expect_err("zero call timeout must be rejected");
    assert!(err.to_string().contains("call_timeout_secs"));

    clear_env_vars();
}
