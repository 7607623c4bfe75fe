//! Error types for the reconciliation engine.
//!
//! Per the engine's external contract, `run`/`put` never surface `Result`
//! to the caller — a switch connection error, a decode failure, or a
//! negotiation failure is handled by logging and self-healing state
//! transitions, the same way the original absorbs these into `VLOG_ERR`
//! calls rather than propagating a C return code. `OfctrlError` exists for
//! the few boundaries that are genuinely exceptional to the caller:
//! packet injection, and decode failures surfaced to callers that embed a
//! raw message decoder.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfctrlError {
    #[error("failed to decode OpenFlow message: {0}")]
    Decode(String),

    #[error("tunnel metadata negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("packet injection failed: {0}")]
    Inject(String),
}

pub type Result<T> = std::result::Result<T, OfctrlError>;
