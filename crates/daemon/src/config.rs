//! Daemon configuration from environment variables

use anyhow::{Context, Result};
use batchtx_core::application::pool::constants::DEFAULT_BACKLOG_MULTIPLIER;
use batchtx_core::application::{BatchConfig, PoolConfig};
use batchtx_core::domain::chunk::DEFAULT_CHUNK_SIZE;
use std::str::FromStr;

const DEFAULT_DB_PATH: &str = "~/.batchtx/users.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_port: u16,
    /// Worker count; `None` means max(4, available parallelism)
    pub workers: Option<usize>,
    pub backlog_multiplier: usize,
    pub chunk_size: usize,
    pub clear_before_insert: bool,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("BATCHTX_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let log_format = match lookup("BATCHTX_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let chunk_size: usize = parse(&lookup, "BATCHTX_CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            anyhow::bail!("BATCHTX_CHUNK_SIZE must be at least 1");
        }

        let workers: Option<usize> = parse(&lookup, "BATCHTX_WORKERS")?;
        if workers == Some(0) {
            anyhow::bail!("BATCHTX_WORKERS must be at least 1");
        }

        Ok(Self {
            db_path: shellexpand::tilde(&db_path).into_owned(),
            rpc_port: parse(&lookup, "BATCHTX_RPC_PORT")?
                .unwrap_or(batchtx_api_rpc::server::DEFAULT_RPC_PORT),
            workers,
            backlog_multiplier: parse(&lookup, "BATCHTX_BACKLOG_MULTIPLIER")?
                .unwrap_or(DEFAULT_BACKLOG_MULTIPLIER),
            chunk_size,
            clear_before_insert: parse(&lookup, "BATCHTX_CLEAR_BEFORE_INSERT")?.unwrap_or(true),
            log_format,
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        match self.workers {
            Some(workers) => PoolConfig::with_workers(workers, self.backlog_multiplier),
            None => PoolConfig::from_available_parallelism(self.backlog_multiplier),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            chunk_size: self.chunk_size,
            clear_before_insert: self.clear_before_insert,
        }
    }

    /// sqlx connection URL for `db_path`
    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
        })
        .transpose()
}
