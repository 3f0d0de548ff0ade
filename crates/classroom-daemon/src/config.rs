//! Command-line and environment configuration for the daemon.

use std::path::PathBuf;

use clap::Parser;
use classroom_core::content::ConnectionString;
use classroom_core::StoreError;

/// Classroom content server
#[derive(Parser, Debug)]
#[command(name = "classroom-daemon")]
#[command(version)]
pub struct Args {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5000, env = "PORT")]
    pub port: u16,

    /// Document store connection string (`file://<dir>`, a bare path, or `memory://`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory uploaded lesson files are written to
    #[arg(long, default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Built front-end served for unmatched paths
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error(transparent)]
    InvalidDatabaseUrl(#[from] StoreError),
}

/// Validated daemon settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    pub database: ConnectionString,
    pub uploads_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let url = args
            .database_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let database = url.trim().parse::<ConnectionString>()?;

        Ok(Self {
            host: args.host,
            port: args.port,
            database,
            uploads_dir: args.uploads_dir,
            static_dir: args.static_dir,
        })
    }
}
