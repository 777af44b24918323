//! Schema-validated structured generation on top of hosted model
//! endpoints.
//!
//! Describe the output you want as a schema, send a prompt, and get a
//! typed value back; or stream it and watch the value take shape
//! through partial fragments. Transient transport failures are retried
//! with backoff, tool round trips are tracked per call, and validation
//! failures carry the raw text alongside the mismatch description.

#![deny(missing_docs)]

pub use objgen_core::*;

/// Re-exports of [`objgen_model`] crate.
pub mod model {
    pub use objgen_model::*;
}

/// Re-exports of [`objgen_openai_model`] crate.
pub mod openai {
    pub use objgen_openai_model::*;
}
