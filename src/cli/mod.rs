//! CLI for baas-client.

pub mod auth;
pub mod resources;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::app::Application;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::storage::{FileStorage, FileStorageConfig};

/// baas CLI
#[derive(Parser, Debug)]
#[command(name = "baas", version, about = "Backend-as-a-service client CLI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Application API key (overrides config file and BAAS_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted session
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a username and password
    Login(LoginArgs),
    /// Show the current session
    Status,
    /// Revoke the current token and clear the session
    Logout,
    /// Show the authenticated user
    Whoami(WhoamiArgs),
    /// Query a resource collection
    Find(FindArgs),
}

/// Arguments for `baas login`.
#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(short, long)]
    pub username: String,

    /// Password (prompted on stdin when omitted)
    #[arg(short, long, env = "BAAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request a sliding-window token
    #[arg(long)]
    pub sliding: bool,
}

/// Arguments for `baas whoami`.
#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Fetch from the platform instead of the cached copy
    #[arg(long)]
    pub refresh: bool,

    /// Related data to embed when refreshing
    #[arg(long)]
    pub embed: Option<String>,
}

/// Arguments for `baas find`.
#[derive(Args, Debug)]
pub struct FindArgs {
    /// Resource path, e.g. `article` or `resources/cars`
    pub resource: String,

    #[arg(short = 'q', long)]
    pub search: Option<String>,

    #[arg(long)]
    pub page: Option<u32>,

    #[arg(long)]
    pub rpp: Option<u32>,

    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long)]
    pub embed: Option<String>,

    #[arg(long)]
    pub fields: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl GlobalArgs {
    /// Resolve configuration: config file, then env, then flags.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let path = self.config.clone().or_else(ClientConfig::default_path);
        let config = ClientConfig::load(path.as_deref())?;
        Ok(match &self.api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        })
    }

    pub fn storage(&self) -> FileStorage {
        match &self.storage_dir {
            Some(dir) => FileStorage::new(FileStorageConfig::new(dir.clone())),
            None => FileStorage::new_default(),
        }
    }

    pub fn application(&self) -> Result<Application> {
        let storage = self.storage();
        Application::new(self.client_config()?, Arc::new(storage.context()))
    }
}
