/// Shared modules for the pump-flow terminals
pub mod aggregation;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod price;
pub mod ranking;
pub mod runtime;
pub mod socketio;
pub mod store;
pub mod types;
pub mod websocket;
