use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domains::retention::SweepConfig;
use crate::domains::store::RetentionScope;

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Bind address
    pub bind_address: String,

    /// Enable structured JSON logging (for Docker/production)
    #[serde(default)]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[serde(default)]
    pub generate_config: bool,

    /// Data directory for the SQLite database
    pub data_dir: String,

    /// htpasswd file with bcrypt credentials
    pub credentials_file: String,

    /// Realm announced in the Basic auth challenge
    pub realm: String,

    /// Upper bound in seconds for a single storage call (unset: no limit)
    #[serde(default)]
    pub store_timeout_secs: Option<u64>,

    /// Largest accepted blob in KiB
    pub max_blob_size_kb: u32,

    /// Retention configuration (loaded from [retention] section in TOML)
    #[serde(default)]
    pub retention: Option<RetentionConfig>,
}

/// c't SESAM sync server
///
/// Only flags given on the command line are serialized, so unset flags
/// never mask values from the TOML file or the environment.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "sesam-server", version, about = "c't SESAM sync server")]
pub struct Cli {
    /// Path to TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    #[serde(skip)]
    pub config: String,

    /// Port to listen on [default: 8088]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for the SQLite database [default: ./data]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// htpasswd file with bcrypt credentials [default: .htpasswd]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,

    /// Realm announced in the Basic auth challenge [default: c't SESAM]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    /// Upper bound in seconds for a single storage call (unset: no limit)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_timeout_secs: Option<u64>,

    /// Largest accepted blob in KiB [default: 64]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_blob_size_kb: Option<u32>,
}

const DEFAULT_CONFIG_PATH: &str = "./sesam.toml";

/// Configuration for the version retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Versions older than this many days may be purged (default: 90)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Interval in seconds between sweeps (default: 43200 = 12 hours)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Which versions always survive: "global" keeps the newest version of
    /// the whole store, "per-user" keeps the newest version of every user
    #[serde(default)]
    pub scope: RetentionScope,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            sweep_interval_secs: 43_200,
            scope: RetentionScope::Global,
        }
    }
}

impl RetentionConfig {
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            retention: chrono::Duration::days(i64::from(self.retention_days)),
            interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            scope: self.scope,
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_sweep_interval() -> u64 {
    43_200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8088,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            credentials_file: ".htpasswd".to_string(),
            realm: "c't SESAM".to_string(),
            store_timeout_secs: None,
            max_blob_size_kb: 64,
            retention: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SESAM_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Cli::parse();
        Self::figment(&cli).extract()
    }

    /// Build the layered provider chain for the given command line.
    /// Nested keys use a double underscore in env vars, e.g.
    /// `SESAM_RETENTION__RETENTION_DAYS=30`.
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("SESAM_").split("__"))
            .merge(Serialized::defaults(cli))
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_secs.map(Duration::from_secs)
    }

    pub fn max_blob_bytes(&self) -> usize {
        self.max_blob_size_kb as usize * 1024
    }

    pub fn sweep_config(&self) -> SweepConfig {
        self.retention.clone().unwrap_or_default().sweep_config()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# c't SESAM Sync Server Configuration
# Place this file at ./sesam.toml or specify with --config <path>
# All settings can be overridden via environment variables (SESAM_PORT, etc.;
# nested keys use "__", e.g. SESAM_RETENTION__SCOPE) or CLI flags (--port, etc.)

# Server port (default: 8088)
# port = 8088

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# htpasswd file with bcrypt entries (htpasswd -B)
# credentials_file = ".htpasswd"

# Realm announced in the Basic auth challenge
# realm = "c't SESAM"

# Upper bound in seconds for a single storage call (default: no limit)
# store_timeout_secs = 10

# Largest accepted blob in KiB (default: 64)
# max_blob_size_kb = 64

# ---- Version Retention ----
# [retention]

# Versions older than this many days are purged (default: 90)
# retention_days = 90

# Interval in seconds between sweeps (default: 43200 = 12 hours)
# sweep_interval_secs = 43200

# "global": keep only the newest version of the whole store
# "per-user": keep the newest version of every user
# scope = "global"
"#
    .to_string()
}
