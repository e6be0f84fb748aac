//! Basic library shared by services
//!
//! Provides:
//! - logging setup and HTTP access logging
//! - layered configuration loading (defaults, file, environment)
//! - graceful shutdown signal handling
//! - API response envelopes and HTTP errors

pub mod api_types;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};

// Re-export commonly used API types
pub use api_types::{
    ComponentHealth, ErrorInfo, ErrorResponse, HealthStatus, ServiceStatus, SuccessResponse,
};

#[cfg(feature = "axum")]
pub use api_types::AppError;

pub use config_loader::load_config;
pub use logging::{init_with_config, LogConfig};
pub use shutdown::wait_for_shutdown;
