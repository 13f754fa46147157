//! JSON-RPC API Layer
//!
//! Exposes the batch save strategies, the user listing and pool statistics
//! as JSON-RPC 2.0 methods.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
