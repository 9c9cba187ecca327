//! Bridge error types.

use std::io;
use std::path::PathBuf;

use pigwasm_hostapi::{FaultRecord, MarshalError};

/// Top-level error type for the bridge crate.
///
/// Configuration and load errors surface synchronously to the initializing
/// caller; guest-originated faults transition the session to `Faulted` and
/// surface as `GuestFault`. There is no automatic retry anywhere — a failed
/// load terminates the session and the caller may build a new one.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Bad setup caught before any guest call (zero initial pages, import
    /// name collision, missing required export, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Reading the guest binary from disk failed.
    #[error("failed to read guest module from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The guest binary is malformed or its imports cannot be resolved.
    #[error("instantiation error: {0}")]
    Instantiation(#[source] anyhow::Error),

    /// A marshaling scan ran past the region end — host/guest protocol
    /// mismatch, terminal for the operation.
    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),

    /// The runtime refused to grow the shared memory region.
    #[error(
        "memory limit exceeded: grow by {requested_pages} pages refused \
         at {current_pages}/{max_pages} pages"
    )]
    MemoryLimitExceeded {
        requested_pages: u64,
        current_pages: u64,
        max_pages: u64,
    },

    /// A bridge-internal invariant was broken by the caller (for example
    /// establishing the heap base twice in one session).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The guest reported a fatal abort or assertion failure. The session
    /// is permanently `Faulted`.
    #[error("guest fault: {0}")]
    GuestFault(FaultRecord),

    /// The guest trapped for a reason the bridge does not classify
    /// (unreachable, out-of-bounds access inside the guest, ...).
    #[error("guest trapped: {0}")]
    GuestTrapped(String),

    /// Wasmtime engine or linker error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),
}

impl BridgeError {
    /// Shorthand for a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
