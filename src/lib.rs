// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod app;
pub mod config;
pub mod draft;
pub mod model;
pub mod protocol;
pub mod realtime;
pub mod store;
pub mod ws_server;
