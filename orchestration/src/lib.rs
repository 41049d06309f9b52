//! Debit/Credit Orchestrator
//!
//! Drives a payment through fraud assessment, routing, and the two-phase
//! debit/credit state machine against the core banking adapter, with the
//! resiliency envelope around every outbound call.
//!
//! # Safety property
//!
//! For every completed payment either both legs are COMPLETED, or a repair
//! record exists whose debit/credit statuses reflect the observed partial
//! outcome. No path silently loses state: unavailable downstreams park the
//! payment in the queued-message store, failures after a confirmed debit
//! become repairs, and every transition appends to the UETR journey.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod batch;
pub mod engine;
pub mod error;
pub mod gate;
pub mod state;
pub mod types;

// Re-exports
pub use batch::BatchDispatcher;
pub use engine::{
    BatchGroup, PaymentOrchestrator, PaymentReplayDispatcher, CLEARING_MESSAGE_TYPE,
    CORE_BANKING_SERVICE, PAYMENT_MESSAGE_TYPE,
};
pub use gate::{endpoint_types, EndpointGate, GatedPayload};
pub use error::{Error, Result};
pub use state::PaymentState;
pub use types::{PaymentInstruction, PaymentOutcome};
