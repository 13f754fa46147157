//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use batchtx_core::application::{PoolStats, SaveReport};
use batchtx_core::domain::{NewUser, User};
use serde::{Deserialize, Serialize};

/// user.save.{wait_all,submit,chain}.v1 - Save a user set in one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveUsersRequest {
    pub users: Vec<NewUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub batch_id: String,
    pub strategy: String,
    pub chunks: usize,
    pub rows_inserted: i64,
    pub rows_cleared: u64,
    pub state: String,
}

impl From<SaveReport> for SaveResponse {
    fn from(report: SaveReport) -> Self {
        Self {
            batch_id: report.batch_id,
            strategy: report.strategy.to_string(),
            chunks: report.chunks,
            rows_inserted: report.rows_inserted,
            rows_cleared: report.rows_cleared,
            state: report.state.to_string(),
        }
    }
}

/// user.find.v1 - List committed users
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FindRequest {
    /// Return at most this many users (all when absent)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResponse {
    pub total: i64,
    pub users: Vec<User>,
}

/// admin.pool.v1 - Worker pool statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PoolStatsRequest {
    // No parameters needed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatsResponse {
    pub workers: usize,
    pub backlog: usize,
    pub capacity: usize,
    pub in_flight: usize,
    pub running: usize,
    pub peak_running: usize,
    pub started: usize,
    pub rejected: usize,
    pub shutdown: bool,
    pub chunk_size: usize,
    pub uptime_seconds: i64,
}

impl PoolStatsResponse {
    pub fn new(stats: PoolStats, chunk_size: usize, uptime_seconds: i64) -> Self {
        Self {
            workers: stats.workers,
            backlog: stats.backlog,
            capacity: stats.capacity,
            in_flight: stats.in_flight,
            running: stats.running,
            peak_running: stats.peak_running,
            started: stats.started,
            rejected: stats.rejected,
            shutdown: stats.shutdown,
            chunk_size,
            uptime_seconds,
        }
    }
}
