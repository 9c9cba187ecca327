//! `pigwasm-hostapi` — guest-facing ABI definitions and diagnostic types
//! for the PigWasm host bridge.
//!
//! This crate defines everything the bridge and the application share about
//! the guest module's view of the world. It provides:
//!
//! - `abi` — import/export names and memory constants (page size, ceiling)
//! - `FaultRecord` — guest-reported abort/assertion diagnostics
//! - `MarshalError` — out-of-bounds C-string reads across the boundary
//! - `DiagnosticSink` trait — the host's observability channel
//! - `TracingSink` — default sink forwarding diagnostics through `tracing`
//! - `RecordingSink` — in-memory sink for testing

pub mod abi;
pub mod error;
pub mod fault;
pub mod sink;

// Re-export commonly used types at the crate root.
pub use error::MarshalError;
pub use fault::FaultRecord;
pub use sink::{DiagnosticSink, RecordingSink, TracingSink};
