//! Core Banking Adapter
//!
//! Connectivity layer between the orchestration core and tenant core
//! banking systems:
//!
//! - a capability [`CoreBankingAdapter`] contract the core depends on
//! - REST, gRPC, and INTERNAL transports
//! - failure classification (transient / business / not-supported / internal)
//! - an ISO 20022 pacs.008 / pacs.002 codec
//!
//! Unsupported capabilities are a first-class, advertised result: callers
//! can probe [`CoreBankingAdapter::supports`] before invoking, and invoking
//! anyway fails with a typed `NotSupported` error.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod adapter;
pub mod error;
pub mod grpc;
pub mod internal;
pub mod iso20022;
pub mod rest;
pub mod types;

// Re-exports
pub use adapter::{Capability, CoreBankingAdapter};
pub use error::{business_codes, Error, ErrorKind, Result};
pub use grpc::GrpcAdapter;
pub use internal::InternalAdapter;
pub use iso20022::Iso20022Codec;
pub use rest::RestAdapter;
pub use types::*;
