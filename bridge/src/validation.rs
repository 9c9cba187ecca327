//! Guest module validation — ABI compatibility checks.
//!
//! Validates a compiled guest module before any instantiation attempt:
//!
//! 1. The `initialize` entry point exists with the right signature
//! 2. At least one heap-layout export (`getHeapBase`/`getStackBase`) exists
//! 3. All imports come from the `env` namespace, no WASI
//! 4. The guest imports the bridge's memory as `env.memory`
//!
//! Import-name resolution against the assembled import table happens
//! separately at session start, once the application imports are known.

use std::collections::BTreeSet;

use wasmtime::{ExternType, Module, ValType};

use pigwasm_hostapi::abi;

use crate::error::BridgeError;

/// Check if a ValType is i32.
fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

fn instantiation_err(msg: String) -> BridgeError {
    BridgeError::Instantiation(anyhow::anyhow!(msg))
}

/// Validate that a guest module meets the bridge ABI requirements.
pub fn validate_module(module: &Module) -> Result<(), BridgeError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

/// Check the init entry point and the heap-layout exports.
fn validate_exports(module: &Module) -> Result<(), BridgeError> {
    // initialize(pageCount: i32) is required.
    match module.get_export(abi::EXPORT_INIT) {
        Some(ExternType::Func(ft)) => {
            let params: Vec<ValType> = ft.params().collect();
            let results: Vec<ValType> = ft.results().collect();
            if params.len() != 1 || !is_i32(&params[0]) || !results.is_empty() {
                return Err(instantiation_err(format!(
                    "export '{}' must have signature (i32) -> ()",
                    abi::EXPORT_INIT
                )));
            }
        }
        Some(_) => {
            return Err(instantiation_err(format!(
                "export '{}' must be a function",
                abi::EXPORT_INIT
            )));
        }
        None => {
            return Err(instantiation_err(format!(
                "missing required export: {}",
                abi::EXPORT_INIT
            )));
        }
    }

    // At least one heap-layout export, each with signature () -> i32.
    let mut found_heap_export = false;
    for name in [abi::EXPORT_HEAP_BASE, abi::EXPORT_STACK_BASE] {
        match module.get_export(name) {
            Some(ExternType::Func(ft)) => {
                let params: Vec<ValType> = ft.params().collect();
                let results: Vec<ValType> = ft.results().collect();
                if !params.is_empty() || results.len() != 1 || !is_i32(&results[0]) {
                    return Err(instantiation_err(format!(
                        "export '{}' must have signature () -> i32",
                        name
                    )));
                }
                found_heap_export = true;
            }
            Some(_) => {
                return Err(instantiation_err(format!(
                    "export '{}' must be a function",
                    name
                )));
            }
            None => {}
        }
    }
    if !found_heap_export {
        return Err(instantiation_err(format!(
            "guest must export '{}' or '{}' for heap-base discovery",
            abi::EXPORT_HEAP_BASE,
            abi::EXPORT_STACK_BASE
        )));
    }

    Ok(())
}

/// Check that every import comes from `env` and that the guest imports the
/// bridge's memory region.
fn validate_imports(module: &Module) -> Result<(), BridgeError> {
    let mut imports_memory = false;

    for import in module.imports() {
        let module_name = import.module();

        // Reject WASI imports outright.
        if module_name.starts_with("wasi") {
            return Err(instantiation_err(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != abi::IMPORT_MODULE {
            return Err(instantiation_err(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                abi::IMPORT_MODULE,
                import.name()
            )));
        }

        match import.ty() {
            ExternType::Memory(_) if import.name() == abi::MEMORY_IMPORT => {
                imports_memory = true;
            }
            ExternType::Func(_) => {}
            _ => {
                return Err(instantiation_err(format!(
                    "unsupported import kind: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        }
    }

    if !imports_memory {
        return Err(instantiation_err(format!(
            "guest must import the shared region as {}.{}",
            abi::IMPORT_MODULE,
            abi::MEMORY_IMPORT
        )));
    }

    Ok(())
}

/// Check that every function import resolves against the assembled table.
///
/// Run at session start, after the application imports are known; an
/// unresolved name would otherwise only fail deep inside instantiation.
pub fn validate_import_resolution(
    module: &Module,
    table_names: &BTreeSet<String>,
) -> Result<(), BridgeError> {
    for import in module.imports() {
        if matches!(import.ty(), ExternType::Func(_))
            && !table_names.contains(import.name())
        {
            return Err(instantiation_err(format!(
                "unresolved import {}::{} — not in the fixed set and not \
                 supplied by the application",
                import.module(),
                import.name()
            )));
        }
    }
    Ok(())
}
