//! HTTP surface of the CRM suite: REST API, CLI plumbing and the forwarding proxy.

pub mod config;
pub mod http;
pub mod proxy;

pub use config::AppConfig;
pub use http::{AppState, ServeConfig, build_router};
