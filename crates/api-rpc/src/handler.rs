//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the batch save service.

use crate::error::to_rpc_error;
use crate::types::{
    FindRequest, FindResponse, PoolStatsRequest, PoolStatsResponse, SaveResponse,
    SaveUsersRequest,
};
use batchtx_core::application::{BatchSaveService, Strategy};
use batchtx_core::port::UserRepository;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<BatchSaveService>,
    user_repo: Arc<dyn UserRepository>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<BatchSaveService>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            service,
            user_repo,
            start_time: std::time::Instant::now(),
        }
    }

    /// user.save.wait_all.v1 / user.save.submit.v1 / user.save.chain.v1
    pub async fn save(
        &self,
        strategy: Strategy,
        params: SaveUsersRequest,
    ) -> Result<SaveResponse, ErrorObjectOwned> {
        info!(%strategy, records = params.users.len(), "Save requested");

        let report = self
            .service
            .save(strategy, params.users)
            .await
            .map_err(to_rpc_error)?;

        Ok(SaveResponse::from(report))
    }

    /// user.find.v1
    pub async fn find(&self, params: FindRequest) -> Result<FindResponse, ErrorObjectOwned> {
        let mut users = self.user_repo.list_users().await.map_err(to_rpc_error)?;
        let total = users.len() as i64;
        if let Some(limit) = params.limit {
            users.truncate(limit);
        }

        Ok(FindResponse { total, users })
    }

    /// admin.pool.v1
    pub async fn pool_stats(
        &self,
        _params: PoolStatsRequest,
    ) -> Result<PoolStatsResponse, ErrorObjectOwned> {
        Ok(PoolStatsResponse::new(
            self.service.pool().stats(),
            self.service.config().chunk_size,
            self.start_time.elapsed().as_secs() as i64,
        ))
    }
}
