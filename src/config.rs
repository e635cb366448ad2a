//! Configuration for featuremap
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::FEATURE_COLLECTION;

/// Featuremap - GeoJSON feature API for the embedded map page
#[derive(Parser, Debug, Clone)]
#[command(name = "featuremap")]
#[command(about = "Serves the map page and a paginated GeoJSON feature API")]
pub struct Args {
    /// What to do; serves HTTP when omitted
    #[command(subcommand)]
    pub command: Option<Command>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGO_URI")]
    pub mongo_uri: String,

    /// MongoDB database name
    /// Falls back to the database named in MONGO_URI, then to "featuremap"
    #[arg(long, env = "MONGO_DB")]
    pub mongo_db: Option<String>,

    /// Collection holding the feature documents
    #[arg(long, env = "FEATURE_COLLECTION", default_value = FEATURE_COLLECTION)]
    pub feature_collection: String,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "4000")]
    pub port: u16,

    /// Runtime environment ("development" enables verbose error messages)
    #[arg(long, env = "NODE_ENV")]
    pub node_env: Option<String>,

    /// Directory holding index.html and the icon asset
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// How long a computed feature count stays fresh
    #[arg(long, env = "COUNT_CACHE_TTL_SECS", default_value = "30")]
    pub count_cache_ttl_secs: u64,

    /// Interval between connectivity pings against MongoDB
    #[arg(long, env = "DB_PING_INTERVAL_SECS", default_value = "10")]
    pub db_ping_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (pretty, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Featuremap subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Load a GeoJSON file into the feature collection
    Import {
        /// Path to a FeatureCollection or Feature file
        path: PathBuf,

        /// Value stored in each feature's `file` field (defaults to the file name)
        #[arg(long)]
        file: Option<String>,
    },
}

impl Args {
    /// Socket address the server binds to
    pub fn listen(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Development mode exposes internal error messages to clients
    pub fn dev_mode(&self) -> bool {
        self.node_env.as_deref() == Some("development")
    }

    pub fn count_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.count_cache_ttl_secs)
    }

    pub fn db_ping_interval(&self) -> Duration {
        Duration::from_secs(self.db_ping_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mongo_uri.trim().is_empty() {
            return Err("MONGO_URI must not be empty".to_string());
        }

        if self.count_cache_ttl_secs == 0 {
            return Err("COUNT_CACHE_TTL_SECS must be greater than zero".to_string());
        }

        if self.db_ping_interval_secs == 0 {
            return Err("DB_PING_INTERVAL_SECS must be greater than zero".to_string());
        }

        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }
}
