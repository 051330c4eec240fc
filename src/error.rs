//! Error types surfaced by request controllers
//!
//! Only configuration problems and chain terminations reach callers. Transport
//! failures are absorbed by the backoff path and never appear here, except as
//! the last error of a chain that hit its failure ceiling.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Neither the overrides nor the instance config resolve a url
    #[error("You must define url for the request to be sent")]
    MissingUrl,

    /// The chain was cancelled with `clear()`
    #[error("request {url} attempt canceled")]
    Cancelled { url: String },

    /// The chain was cancelled by a newer `send()` on the same controller
    #[error("request {url} was superseded by a newer request")]
    Superseded { url: String },

    /// The configured ceiling on consecutive transport failures was reached
    #[error("request {url} gave up after {failures} consecutive failures: {last_error}")]
    AttemptsExhausted {
        url: String,
        failures: u32,
        last_error: String,
    },

    /// `retry()` was called while no chain waits on a continuation decision
    #[error("no request is waiting for a continuation decision")]
    NotAwaitingContinuation,

    /// All controller handles were dropped before the chain ended
    #[error("request controller was dropped before the request finished")]
    ControllerDropped,

    /// Event tracking was requested without an event token
    #[error("You must provide event token in order to track event")]
    MissingEventToken,
}

pub type Result<T> = std::result::Result<T, ControllerError>;
