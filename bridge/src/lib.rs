//! `pigwasm-bridge` — Wasmtime-based host bridge for PigWasm guest modules.
//!
//! This crate loads a sandboxed guest module into the host process,
//! establishes a shared growable memory region between host and guest, and
//! exposes the fixed set of host functions the guest cannot live without:
//! fatal-error reporting, assertion failures, memory growth, and diagnostic
//! logging. The core is the host–guest memory bridge:
//!
//! - **Heap-base negotiation:** where the guest's allocator begins in the
//!   shared region, discovered from the guest's exports (direct or derived)
//! - **Append-only growth:** page-granular, never invalidates guest offsets
//! - **C-string marshaling:** null-terminated single-byte text decoded from
//!   guest-supplied offsets
//!
//! The primary entry points are [`Bridge::new`] / [`Bridge::from_file`] and
//! [`Bridge::start_session`].

pub mod config;
pub mod error;
pub mod host_impl;
pub mod linker;
pub mod marshal;
pub mod memory;
pub mod runtime;
pub mod validation;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use host_impl::{HostState, SessionStatus};
pub use linker::ImportTableBuilder;
pub use memory::{HeapBaseSource, MemoryManager};
pub use runtime::{Bridge, BridgeSession};
