//! # Command Line Runner
//!
//! `soundpatch-api --env <development|production>` selects the runtime
//! profile. The profile decides how many workers serve requests, how chatty
//! logging is by default and whether the config file is watched for changes.

use crate::config::AppConfig;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Worker count for the production profile.
pub const PRODUCTION_WORKERS: usize = 4;

#[derive(Debug, Clone, Parser)]
#[command(name = "soundpatch-api", version, about = "SoundPatch AI HTTP API service")]
pub struct Cli {
    /// Runtime profile. Falls back to the ENVIRONMENT variable.
    #[arg(long = "env", env = "ENVIRONMENT", value_enum, default_value_t = Environment::Production)]
    pub environment: Environment,

    /// Optional TOML configuration file.
    #[arg(short = 'c', long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Address to bind (overrides configuration).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides configuration).
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Apply command line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// The deployment profile, matching the image build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    /// Development serves from a single worker; production always runs four.
    pub fn workers(self) -> usize {
        match self {
            Environment::Development => 1,
            Environment::Production => PRODUCTION_WORKERS,
        }
    }

    pub fn reload_enabled(self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    pub fn default_log_filter(self, debug: bool) -> &'static str {
        if debug || self == Environment::Development {
            "soundpatch_api=debug,actix_web=debug"
        } else {
            "soundpatch_api=info,actix_web=info"
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
