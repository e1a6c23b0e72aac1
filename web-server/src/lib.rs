// web-server/src/lib.rs
pub mod api;
pub mod error;
pub mod rpc;
pub mod session_registry;
pub mod signal_bridge;
pub mod token_exchange;
