//! Configuration for the signflow engine

use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignflowConfig {
    /// Workflow controller settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Invitation issuance settings
    #[serde(default)]
    pub invitations: InvitationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SignflowConfig {
    /// Layer defaults, an optional file and `SIGNFLOW_` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `SIGNFLOW_INVITATIONS__DEFAULT_TTL_SECS=3600`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SignflowConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SIGNFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// Workflow controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Compare-and-swap attempts for publish/sign/archive before giving up
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,

    /// Render an export when a document is archived
    #[serde(default = "default_true")]
    pub export_on_archive: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: default_max_commit_retries(),
            export_on_archive: true,
        }
    }
}

/// Invitation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    /// Lifetime of an invitation when the caller gives none
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Upper bound on a caller-supplied lifetime
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,

    /// Random bytes per token (hex encoded, so the token is twice as long)
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
}

impl InvitationConfig {
    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_ttl_secs as i64)
    }

    pub fn max_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_ttl_secs as i64)
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_ttl_secs: default_max_ttl_secs(),
            token_bytes: default_token_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_max_commit_retries() -> u32 {
    16
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_ttl_secs() -> u64 {
    90 * 24 * 60 * 60
}

fn default_token_bytes() -> usize {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}
