//! Payment Routing Engine
//!
//! Decides whether a payment stays inside the bank or crosses a clearing
//! network, which network clears it, and the processing mode and message
//! format of the dispatch. Routes are derived values; configuration (rules
//! and clearing systems) is the only authoritative state.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod clearing;
pub mod engine;
pub mod error;
pub mod types;

// Re-exports
pub use clearing::{ClearingSystemConfig, ClearingSystemRegistry};
pub use engine::{RouteContext, RoutingEngine, RoutingRuleStore};
pub use error::{Error, Result};
pub use types::{PaymentRoute, PaymentRoutingRule, RoutingType};
