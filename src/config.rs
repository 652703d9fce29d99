use crate::admission::AdmissionPolicy;
use crate::pipeline_run::PipelineRunResource;
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::Path;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Kubernetes API server URL
    #[arg(long, env = "KUBE_API_URL")]
    pub api_url: Option<String>,

    /// Reject the new run when sibling runs were cancelled
    #[arg(long, env = "ENFORCE_CANCELLATION_BLOCKS_ADMISSION")]
    pub enforce_cancellation_blocks_admission: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub control_plane: ControlPlaneConfig,
    pub pipeline_runs: PipelineRunResource,
    pub admission: AdmissionPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlPlaneConfig {
    pub api_url: String,
    pub token_file: Option<String>,
    pub ca_file: Option<String>,
    pub insecure_skip_tls_verify: bool,
    /// Bound on each individual list or patch call.
    pub call_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let defaults = PipelineRunResource::default();
        let mut builder = Config::builder()
            .set_default("server.port", 8443)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 10)?
            .set_default("control_plane.api_url", default_api_url())?
            .set_default(
                "control_plane.token_file",
                format!("{SERVICE_ACCOUNT_DIR}/token"),
            )?
            .set_default(
                "control_plane.ca_file",
                format!("{SERVICE_ACCOUNT_DIR}/ca.crt"),
            )?
            .set_default("control_plane.insecure_skip_tls_verify", false)?
            .set_default("control_plane.call_timeout_secs", 5)?
            .set_default("pipeline_runs.group", defaults.group)?
            .set_default("pipeline_runs.version", defaults.version)?
            .set_default("pipeline_runs.resource", defaults.resource)?
            .set_default("admission.enforce_cancellation_blocks_admission", false)?;

        // Config file: explicit path must exist, ./config.yaml is optional.
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::new("config.yaml", FileFormat::Yaml));
        }

        // E.g. PR_SERVER__PORT=9000, PR_CONTROL_PLANE__CALL_TIMEOUT_SECS=3
        builder = builder.add_source(
            Environment::with_prefix("PR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their clap env vars) win over everything else.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(url) = cli.api_url {
            builder = builder.set_override("control_plane.api_url", url)?;
        }
        if let Some(enforce) = cli.enforce_cancellation_blocks_admission {
            builder =
                builder.set_override("admission.enforce_cancellation_blocks_admission", enforce)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        if cfg.control_plane.call_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "control_plane.call_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }
}

/// In-cluster API server address, from the service env vars when present.
fn default_api_url() -> String {
    match (
        env::var("KUBERNETES_SERVICE_HOST"),
        env::var("KUBERNETES_SERVICE_PORT"),
    ) {
        (Ok(host), Ok(port)) if !host.is_empty() => {
            if host.contains(':') {
                format!("https://[{host}]:{port}")
            } else {
                format!("https://{host}:{port}")
            }
        }
        _ => "https://kubernetes.default.svc".to_string(),
    }
}
