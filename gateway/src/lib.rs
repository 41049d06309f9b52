//! PayGrid Gateway
//!
//! The process entry point of the middleware: composes every component
//! once (explicit composition root), exposes the tenant-scoped operational
//! HTTP surface, and owns the background workers (self-healing monitor,
//! repair schedulers, batch dispatcher).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiErrorKind};
pub use routes::router;
pub use state::{build, AppState, Background};
