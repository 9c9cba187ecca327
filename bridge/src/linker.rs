//! Import table assembly and fixed host-function registration.
//!
//! The guest sees one flat `env` namespace: the bridge's fixed diagnostic
//! and memory functions merged with whatever the application supplies. The
//! merge is deterministic and collision-checked at assembly time — an
//! application name that matches a fixed name is a configuration error, so
//! fixed names always resolve to the bridge's own implementations.
//!
//! Each fixed function:
//! 1. Reaches the memory manager and sink through the `Caller`'s HostState
//! 2. Decodes string arguments via the C-string marshaler
//! 3. Performs the operation, or records a fault/typed cause and traps

use std::collections::BTreeSet;

use wasmtime::{Caller, Engine, IntoFunc, Linker};

use pigwasm_hostapi::abi;
use pigwasm_hostapi::FaultRecord;

use crate::error::BridgeError;
use crate::host_impl::HostState;
use crate::marshal;

/// The assembled import namespace, ready for instantiation.
pub struct ImportTable {
    pub(crate) linker: Linker<HostState>,
    names: BTreeSet<String>,
}

impl std::fmt::Debug for ImportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportTable")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ImportTable {
    /// Every function name defined in the `env` namespace.
    pub(crate) fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

type DefineFn = Box<dyn FnOnce(&mut Linker<HostState>) -> Result<(), anyhow::Error>>;

/// Builder merging application imports over the fixed bridge set.
///
/// Application functions are ordinary `wasmtime` host closures over
/// `HostState`; they are registered after the fixed set, and any name
/// collision fails [`build`](Self::build) with a `Configuration` error.
#[derive(Default)]
pub struct ImportTableBuilder {
    app: Vec<(String, DefineFn)>,
}

impl ImportTableBuilder {
    /// A builder with no application imports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an application-supplied host function under `name`.
    pub fn func_wrap<Params, Results>(
        mut self,
        name: impl Into<String>,
        func: impl IntoFunc<HostState, Params, Results> + 'static,
    ) -> Self {
        let name = name.into();
        let defined = name.clone();
        self.app.push((
            name,
            Box::new(move |linker| {
                linker.func_wrap(abi::IMPORT_MODULE, &defined, func)?;
                Ok(())
            }),
        ));
        self
    }

    /// Assemble the import table: collision-check, then register the fixed
    /// set followed by the application set.
    pub fn build(self, engine: &Engine) -> Result<ImportTable, BridgeError> {
        let mut names: BTreeSet<String> =
            abi::FIXED_IMPORTS.iter().map(|n| n.to_string()).collect();

        for (name, _) in &self.app {
            if abi::FIXED_IMPORTS.contains(&name.as_str()) {
                return Err(BridgeError::Configuration(format!(
                    "application import '{}' collides with a fixed bridge import",
                    name
                )));
            }
            if name == abi::MEMORY_IMPORT {
                return Err(BridgeError::Configuration(format!(
                    "application import '{}' collides with the memory import",
                    name
                )));
            }
            if !names.insert(name.clone()) {
                return Err(BridgeError::Configuration(format!(
                    "duplicate application import '{}'",
                    name
                )));
            }
        }

        let mut linker = Linker::new(engine);
        register_fixed_imports(&mut linker)?;
        for (_, define) in self.app {
            define(&mut linker)?;
        }
        Ok(ImportTable { linker, names })
    }
}

/// Register the bridge's own functions with the linker.
pub fn register_fixed_imports(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    register_abort(linker)?;
    register_assert_failure(linker)?;
    register_debug_break(linker)?;
    register_grow_memory(linker)?;
    register_get_heap_size(linker)?;
    register_log_number(linker)?;
    register_log_float(linker)?;
    register_log_string(linker)?;
    Ok(())
}

/// Decode a guest string offset through the session's region.
///
/// A marshal failure stashes the typed cause in HostState before trapping,
/// so the host call site reports `OutOfBoundsRead` instead of a bare trap.
fn read_guest_string(
    caller: &mut Caller<'_, HostState>,
    offset: u32,
) -> Result<String, anyhow::Error> {
    let region = caller
        .data()
        .memory()
        .map_err(anyhow::Error::new)?
        .region()
        .clone();
    let decoded = marshal::read_cstring(region.data(&*caller), offset);
    match decoded {
        Ok(s) => Ok(s),
        Err(err) => {
            caller.data_mut().set_pending(BridgeError::Marshal(err.clone()));
            Err(anyhow::Error::new(err))
        }
    }
}

// ── Fatal Faults ──

fn register_abort(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_ABORT,
        |mut caller: Caller<'_, HostState>,
         msg_ptr: u32,
         exit_code: i32|
         -> Result<(), anyhow::Error> {
            let message = read_guest_string(&mut caller, msg_ptr)?;
            caller
                .data_mut()
                .record_fault(FaultRecord::Abort { message, exit_code });
            // Trap so no further guest code runs in this session.
            Err(anyhow::anyhow!("guest called abort"))
        },
    )?;
    Ok(())
}

fn register_assert_failure(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_ASSERT_FAILURE,
        |mut caller: Caller<'_, HostState>,
         file_ptr: u32,
         line: u32,
         func_ptr: u32,
         cond_ptr: u32,
         msg_ptr: u32|
         -> Result<(), anyhow::Error> {
            let file = read_guest_string(&mut caller, file_ptr)?;
            let function = read_guest_string(&mut caller, func_ptr)?;
            let condition = read_guest_string(&mut caller, cond_ptr)?;
            // A NUL message pointer means the assertion carried no message.
            let message = if msg_ptr == 0 {
                None
            } else {
                Some(read_guest_string(&mut caller, msg_ptr)?)
            };
            caller.data_mut().record_fault(FaultRecord::AssertFailure {
                file,
                line,
                function,
                condition,
                message,
            });
            Err(anyhow::anyhow!("guest assertion failed"))
        },
    )?;
    Ok(())
}

// ── Debug Hook ──

fn register_debug_break(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_DEBUG_BREAK,
        |caller: Caller<'_, HostState>| {
            caller.data().sink().debug_break();
        },
    )?;
    Ok(())
}

// ── Memory ──

fn register_grow_memory(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_GROW_MEMORY,
        |mut caller: Caller<'_, HostState>, pages: u32| -> Result<(), anyhow::Error> {
            let manager = caller.data().memory().map_err(anyhow::Error::new)?.clone();
            match manager.grow(&mut caller, u64::from(pages)) {
                Ok(new_len) => {
                    tracing::trace!(pages, new_len, "guest grew shared memory");
                    Ok(())
                }
                Err(err) => {
                    let trap = anyhow::anyhow!("{}", err);
                    caller.data_mut().set_pending(err);
                    Err(trap)
                }
            }
        },
    )?;
    Ok(())
}

fn register_get_heap_size(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_GET_HEAP_SIZE,
        |caller: Caller<'_, HostState>| -> Result<u32, anyhow::Error> {
            let manager = caller.data().memory().map_err(anyhow::Error::new)?;
            Ok(manager.free_bytes(&caller) as u32)
        },
    )?;
    Ok(())
}

// ── Diagnostics ──

fn register_log_number(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_LOG_NUMBER,
        |mut caller: Caller<'_, HostState>,
         label_ptr: u32,
         value: i32|
         -> Result<(), anyhow::Error> {
            let label = read_guest_string(&mut caller, label_ptr)?;
            caller.data().sink().log_number(&label, value);
            Ok(())
        },
    )?;
    Ok(())
}

fn register_log_float(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_LOG_FLOAT,
        |mut caller: Caller<'_, HostState>,
         label_ptr: u32,
         value: f64|
         -> Result<(), anyhow::Error> {
            let label = read_guest_string(&mut caller, label_ptr)?;
            caller.data().sink().log_float(&label, value);
            Ok(())
        },
    )?;
    Ok(())
}

fn register_log_string(linker: &mut Linker<HostState>) -> Result<(), BridgeError> {
    linker.func_wrap(
        abi::IMPORT_MODULE,
        abi::IMPORT_LOG_STRING,
        |mut caller: Caller<'_, HostState>, str_ptr: u32| -> Result<(), anyhow::Error> {
            let text = read_guest_string(&mut caller, str_ptr)?;
            caller.data().sink().log_text(&text);
            Ok(())
        },
    )?;
    Ok(())
}
