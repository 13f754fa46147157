//! JSON-RPC Server
//!
//! Serves the batch save API over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::types::{FindRequest, PoolStatsRequest, SaveUsersRequest};
use batchtx_core::application::{BatchSaveService, Strategy};
use batchtx_core::port::UserRepository;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9640;

/// Method name for each save strategy
pub fn save_method(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::WaitAll => "user.save.wait_all.v1",
        Strategy::SubmitCollect => "user.save.submit.v1",
        Strategy::SequentialChain => "user.save.chain.v1",
    }
}

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        service: Arc<BatchSaveService>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(service, user_repo)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    /// Security: only binds to the configured host, 127.0.0.1 by default.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        for strategy in Strategy::ALL {
            let handler = self.handler.clone();
            module
                .register_async_method(save_method(strategy), move |params, _, _| {
                    let handler = handler.clone();
                    async move {
                        let req: SaveUsersRequest = params.parse()?;
                        handler.save(strategy, req).await
                    }
                })
                .map_err(|e| e.to_string())?;
        }

        let handler = self.handler.clone();
        module
            .register_async_method("user.find.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req = params.parse::<Option<FindRequest>>()?.unwrap_or_default();
                    handler.find(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("admin.pool.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.pool_stats(PoolStatsRequest::default()).await }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
