//! Bridge runtime — engine creation, module loading, and session lifecycle.
//!
//! `Bridge` compiles and validates a guest module; `start_session` performs
//! the full handshake in a fixed order: allocate the shared region, assemble
//! the import table, instantiate, discover the heap base from the guest's
//! exports, correct the page accounting, and call the guest's `initialize`.
//! The resulting `BridgeSession` owns the guest handle and all per-session
//! state.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use wasmtime::{Config, Engine, Instance, Module, Store, WasmParams, WasmResults};

use pigwasm_hostapi::abi;
use pigwasm_hostapi::{DiagnosticSink, FaultRecord};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::host_impl::{HostState, SessionStatus};
use crate::linker::ImportTableBuilder;
use crate::marshal;
use crate::memory::{GuestRegion, HeapBaseSource, MemoryManager};
use crate::validation::{validate_import_resolution, validate_module};

/// A loaded, validated guest module, ready to start sessions.
///
/// One `Bridge` can start any number of sessions; each gets a fresh store,
/// a fresh shared memory region, and its own import table. There is no
/// retry built in — a failed session is discarded and a new one started.
pub struct Bridge {
    engine: Engine,
    module: Module,
    config: BridgeConfig,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Compile a guest module from wasm bytes (or WAT text) and validate
    /// its ABI.
    pub fn new(wasm_bytes: &[u8], config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm_bytes).map_err(BridgeError::Instantiation)?;
        validate_module(&module)?;
        Ok(Self { engine, module, config })
    }

    /// Load a guest module from a `.wasm` file path.
    pub fn from_file(path: &Path, config: BridgeConfig) -> Result<Self, BridgeError> {
        let bytes = fs::read(path).map_err(|source| BridgeError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(&bytes, config)
    }

    /// The configuration sessions will be started with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run the bridge handshake and return a live session.
    ///
    /// Sequence: allocate the initial region → assemble imports → resolve-
    /// check the module's imports → instantiate → read heap-layout metadata
    /// → finalize the heap base → call `initialize(pageCount)`.
    pub fn start_session(
        &self,
        imports: ImportTableBuilder,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<BridgeSession, BridgeError> {
        let mut store = Store::new(&self.engine, HostState::new(sink));

        let manager =
            MemoryManager::allocate_initial_region(&self.engine, &mut store, &self.config)?;
        let region = manager.region().clone();
        store.data_mut().set_memory(manager);

        let table = imports.build(&self.engine)?;
        validate_import_resolution(&self.module, table.names())?;

        let mut linker = table.linker;
        linker.define(&mut store, abi::IMPORT_MODULE, abi::MEMORY_IMPORT, region.as_extern())?;

        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(BridgeError::Instantiation)?;

        // Heap-base discovery. Prefer the guest's own heap-base export;
        // fall back to deriving from its static-data boundary.
        let source = if let Some(func) = instance.get_func(&mut store, abi::EXPORT_HEAP_BASE) {
            let func = func.typed::<(), u32>(&store)?;
            let result = func.call(&mut store, ());
            let addr = handle_trap(&mut store, result)?;
            HeapBaseSource::Direct(addr)
        } else {
            let func = instance
                .get_typed_func::<(), u32>(&mut store, abi::EXPORT_STACK_BASE)?;
            let result = func.call(&mut store, ());
            let boundary = handle_trap(&mut store, result)?;
            HeapBaseSource::Derived {
                boundary,
                margin: self.config.safety_margin_bytes,
            }
        };
        let heap_base = store.data_mut().memory_mut()?.establish_heap_base(source)?;

        // Page accounting for the init call. If the byte length is somehow
        // not a page multiple, round the reported count up — the accounting
        // is corrected, the region itself is untouched.
        let len = region.len_bytes(&store) as u64;
        let mut pages = len / u64::from(abi::WASM_PAGE_SIZE);
        if len % u64::from(abi::WASM_PAGE_SIZE) != 0 {
            tracing::warn!(
                len,
                "region length is not a multiple of the page size; \
                 rounding the reported page count up"
            );
            pages += 1;
        }
        tracing::debug!(pages, heap_base, "bridge handshake complete, initializing guest");

        let init = instance.get_typed_func::<u32, ()>(&mut store, abi::EXPORT_INIT)?;
        let result = init.call(&mut store, pages as u32);
        handle_trap(&mut store, result)?;

        store.data_mut().mark_ready();
        Ok(BridgeSession { store, instance, region })
    }
}

/// A live guest session: the instantiated module, its store, and the
/// shared memory region.
///
/// Owned exclusively by the caller; the guest's entry points are reachable
/// only through [`invoke`](Self::invoke), which enforces the session
/// lifecycle (a faulted session stays faulted).
pub struct BridgeSession {
    store: Store<HostState>,
    instance: Instance,
    region: GuestRegion,
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl BridgeSession {
    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        self.store.data().status()
    }

    /// The guest fault that ended this session, if any.
    pub fn fault(&self) -> Option<FaultRecord> {
        self.store.data().fault().cloned()
    }

    /// The heap base established during the handshake.
    pub fn heap_base(&self) -> Option<u32> {
        self.store.data().memory().ok().and_then(|m| m.heap_base())
    }

    /// Current region size in pages.
    pub fn memory_pages(&self) -> u64 {
        self.region.size_pages(&self.store)
    }

    /// Current region length in bytes.
    pub fn memory_len(&self) -> usize {
        self.region.len_bytes(&self.store)
    }

    /// Bytes available to the guest allocator (`region length - heap base`).
    pub fn free_bytes(&self) -> u64 {
        match self.store.data().memory() {
            Ok(manager) => manager.free_bytes(&self.store),
            Err(_) => 0,
        }
    }

    /// Application-initiated growth of the shared region.
    pub fn grow(&mut self, pages: u64) -> Result<u64, BridgeError> {
        let manager = self.store.data().memory()?.clone();
        manager.grow(&mut self.store, pages)
    }

    /// Call a guest entry point by name with typed parameters and results.
    ///
    /// Fails with the original `GuestFault` if the session has faulted;
    /// a fault raised during this call transitions the session permanently.
    pub fn invoke<P, R>(&mut self, name: &str, params: P) -> Result<R, BridgeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.ensure_ready()?;
        let func = self
            .instance
            .get_typed_func::<P, R>(&mut self.store, name)?;
        let result = func.call(&mut self.store, params);
        handle_trap(&mut self.store, result)
    }

    /// Read a null-terminated guest string from the region, host-side.
    pub fn read_cstring(&self, offset: u32) -> Result<String, BridgeError> {
        Ok(marshal::read_cstring(self.region.data(&self.store), offset)?)
    }

    fn ensure_ready(&self) -> Result<(), BridgeError> {
        match self.store.data().status() {
            SessionStatus::Ready => Ok(()),
            SessionStatus::Faulted => Err(match self.store.data().fault().cloned() {
                Some(fault) => BridgeError::GuestFault(fault),
                None => BridgeError::InvariantViolation("session is faulted".into()),
            }),
            SessionStatus::Loading => Err(BridgeError::InvariantViolation(
                "session is still loading".into(),
            )),
        }
    }
}

/// Create a Wasmtime engine for the bridge configuration.
///
/// The threads proposal is enabled only when the region is shared.
fn create_engine(config: &BridgeConfig) -> Result<Engine, BridgeError> {
    let mut wasm_config = Config::new();
    wasm_config.wasm_threads(config.shared_memory);
    Ok(Engine::new(&wasm_config)?)
}

/// Convert a trapped guest call into the typed bridge error.
///
/// Fault recorded by a fixed import → `GuestFault`
/// Pending cause (growth refusal, marshal failure) → that error
/// Anything else → `GuestTrapped`
fn handle_trap<R>(
    store: &mut Store<HostState>,
    result: Result<R, anyhow::Error>,
) -> Result<R, BridgeError> {
    match result {
        Ok(val) => Ok(val),
        Err(e) => {
            let state = store.data_mut();
            if let Some(fault) = state.fault().cloned() {
                return Err(BridgeError::GuestFault(fault));
            }
            if let Some(pending) = state.take_pending() {
                return Err(pending);
            }
            Err(BridgeError::GuestTrapped(format!("{}", e)))
        }
    }
}
