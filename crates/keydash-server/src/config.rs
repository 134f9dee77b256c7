use std::net::{IpAddr, SocketAddr};

use clap::Args;
use keydash_core::DEFAULT_KEY_PREFIX;
use keydash_db::{DbBackend, DbConfig};

/// Listener, storage and key-generation settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "KEYDASH_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "KEYDASH_PORT", default_value = "3710")]
    pub port: u16,

    /// Storage backend: sqlite or postgres
    #[arg(long, env = "KEYDASH_DB_BACKEND", default_value = "sqlite", value_parser = parse_backend)]
    pub db_backend: DbBackend,

    /// SQLite database file (defaults to the data dir)
    #[arg(long, env = "KEYDASH_SQLITE_PATH")]
    pub sqlite_path: Option<String>,

    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Prefix for generated keys
    #[arg(long, env = "KEYDASH_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    pub key_prefix: String,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            backend: self.db_backend,
            sqlite_path: self.sqlite_path.clone(),
            database_url: self.database_url.clone(),
        }
    }
}

fn parse_backend(s: &str) -> Result<DbBackend, String> {
    DbBackend::parse_str(s).ok_or_else(|| format!("unknown backend '{s}' (expected sqlite or postgres)"))
}
