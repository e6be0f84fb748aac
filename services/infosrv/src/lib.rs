//! Infosrv - remote info service
//!
//! Hosts the remote rule engine behind an HTTP management API and runs the
//! background refresh scheduler.

pub mod config;
pub mod error;
pub mod routes;

pub use config::InfosrvConfig;
pub use routes::{create_routes, AppState};
