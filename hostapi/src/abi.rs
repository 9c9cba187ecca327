//! Guest-facing ABI names and memory constants.
//!
//! These names are stable across versions: a guest module compiled against
//! one release of the bridge must keep resolving against the next. Every
//! string argument in the import set is a byte offset into the shared
//! memory region, interpreted as null-terminated single-byte text.

/// WebAssembly linear memory page size in bytes.
pub const WASM_PAGE_SIZE: u32 = 65536;

/// Hard ceiling on region size: 32768 pages = 2 GiB, the most a 32-bit
/// guest can address.
pub const MAX_MEMORY_PAGES: u64 = 32768;

/// Import namespace presented to the guest.
pub const IMPORT_MODULE: &str = "env";

/// Name of the memory import the guest must declare.
pub const MEMORY_IMPORT: &str = "memory";

// ── Fixed host-callable imports ──

/// `abort(msgPtr: i32, exitCode: i32)` — fatal, unrecoverable guest failure.
pub const IMPORT_ABORT: &str = "abort";

/// `assertFailure(filePtr: i32, line: i32, funcPtr: i32, condPtr: i32,
/// msgPtr: i32)` — failed guest invariant. `msgPtr == 0` means no message.
pub const IMPORT_ASSERT_FAILURE: &str = "assertFailure";

/// `debugBreak()` — interactive-pause hook, a stub in non-interactive hosts.
pub const IMPORT_DEBUG_BREAK: &str = "debugBreak";

/// `growMemory(pages: i32)` — append pages to the shared region.
pub const IMPORT_GROW_MEMORY: &str = "growMemory";

/// `getHeapSize() -> i32` — bytes between the heap base and the region end.
pub const IMPORT_GET_HEAP_SIZE: &str = "getHeapSize";

/// `logNumber(labelPtr: i32, value: i32)` — labeled integer diagnostic.
pub const IMPORT_LOG_NUMBER: &str = "logNumber";

/// `logFloat(labelPtr: i32, value: f64)` — labeled float diagnostic.
pub const IMPORT_LOG_FLOAT: &str = "logFloat";

/// `logString(strPtr: i32)` — free-form text diagnostic.
pub const IMPORT_LOG_STRING: &str = "logString";

/// Every name the bridge itself defines in the import namespace.
/// Application imports must not collide with any of these.
pub const FIXED_IMPORTS: &[&str] = &[
    IMPORT_ABORT,
    IMPORT_ASSERT_FAILURE,
    IMPORT_DEBUG_BREAK,
    IMPORT_GROW_MEMORY,
    IMPORT_GET_HEAP_SIZE,
    IMPORT_LOG_NUMBER,
    IMPORT_LOG_FLOAT,
    IMPORT_LOG_STRING,
];

// ── Guest exports consumed by the bridge ──

/// `initialize(pageCount: i32)` — required init entry point. Called once,
/// after the heap base is finalized, with the current page count.
pub const EXPORT_INIT: &str = "initialize";

/// `getHeapBase() -> i32` — optional. Reports the guest's heap base
/// directly; when present it is used verbatim (newer protocol variant).
pub const EXPORT_HEAP_BASE: &str = "getHeapBase";

/// `getStackBase() -> i32` — optional. Reports the end of the guest's
/// static data; the heap base is derived from it plus a safety margin
/// (older protocol variant).
pub const EXPORT_STACK_BASE: &str = "getStackBase";
