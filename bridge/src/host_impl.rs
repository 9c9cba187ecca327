//! Per-session mutable state held in the Wasmtime `Store`.
//!
//! `HostState` combines the session status, the memory manager, the
//! diagnostic sink, and any guest-reported fault into a single struct that
//! lives inside `Store<HostState>` for the lifetime of one bridge session.
//! There is no ambient global state; everything a fixed import needs is
//! reachable from here through the `Caller`.

use std::sync::Arc;

use pigwasm_hostapi::{DiagnosticSink, FaultRecord};

use crate::error::BridgeError;
use crate::memory::MemoryManager;

/// Lifecycle of a bridge session.
///
/// `Loading → Ready → Faulted`; there is no transition back out of
/// `Faulted`. Diagnostic log calls never change the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Between region allocation and the guest's `initialize` returning.
    Loading,
    /// Guest entry points may be invoked.
    Ready,
    /// The guest reported an abort or assertion failure. Terminal.
    Faulted,
}

/// Per-session state stored in `Store<HostState>`.
pub struct HostState {
    status: SessionStatus,
    sink: Arc<dyn DiagnosticSink>,
    memory: Option<MemoryManager>,
    fault: Option<FaultRecord>,
    /// Error recorded by a fixed import before it traps the guest, so the
    /// host-side call site can report the real cause instead of a generic
    /// trap (growth refusal, marshal failure).
    pending: Option<BridgeError>,
}

impl HostState {
    /// Fresh state for a session about to load.
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            status: SessionStatus::Loading,
            sink,
            memory: None,
            fault: None,
            pending: None,
        }
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The diagnostic sink for this session.
    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    /// Install the memory manager once the region exists.
    pub fn set_memory(&mut self, manager: MemoryManager) {
        self.memory = Some(manager);
    }

    /// The memory manager. Errors before `set_memory`, which only happens
    /// if a fixed import runs before the region is allocated.
    pub fn memory(&self) -> Result<&MemoryManager, BridgeError> {
        self.memory.as_ref().ok_or_else(|| {
            BridgeError::InvariantViolation("shared memory region not allocated yet".into())
        })
    }

    /// Mutable access to the memory manager (heap-base finalization).
    pub fn memory_mut(&mut self) -> Result<&mut MemoryManager, BridgeError> {
        self.memory.as_mut().ok_or_else(|| {
            BridgeError::InvariantViolation("shared memory region not allocated yet".into())
        })
    }

    /// Record a fatal guest fault: surface it through the sink and move the
    /// session permanently to `Faulted`.
    pub fn record_fault(&mut self, fault: FaultRecord) {
        self.sink.fatal(&fault);
        self.status = SessionStatus::Faulted;
        self.fault = Some(fault);
    }

    /// The recorded fault, if the session has one.
    pub fn fault(&self) -> Option<&FaultRecord> {
        self.fault.as_ref()
    }

    /// Stash the typed cause for a trap a fixed import is about to raise.
    pub fn set_pending(&mut self, err: BridgeError) {
        self.pending = Some(err);
    }

    /// Take the stashed trap cause, if any.
    pub fn take_pending(&mut self) -> Option<BridgeError> {
        self.pending.take()
    }

    /// Transition `Loading → Ready` after the guest's `initialize` returns.
    pub fn mark_ready(&mut self) {
        if self.status == SessionStatus::Loading {
            self.status = SessionStatus::Ready;
        }
    }
}
