//! Shared test helpers for integration tests.
//!
//! Provides WAT guest modules exercising the full import surface, plus
//! factory functions that start sessions against a `RecordingSink`.

#![allow(dead_code)]

use std::sync::Arc;

use pigwasm_bridge::{Bridge, BridgeConfig, BridgeSession, ImportTableBuilder};
use pigwasm_hostapi::RecordingSink;

/// Full-featured guest: imports the entire fixed set, reports its static
/// boundary through `getStackBase` (derived heap-base protocol), and
/// re-exports every interesting behavior as a named entry point.
///
/// String layout (data segments):
///   100: "fatal: null pointer"   200: "app/main.c"   220: "UpdateApp"
///   240: "ptr != nullptr"        260: "bad handle"   300: "frame"
///   320: "hello from guest"     1000: "stable"
///   262140: "AAAA" (unterminated, runs to the region end)
pub const GUEST: &str = r#"
    (module
        (import "env" "memory" (memory 4))
        (import "env" "abort" (func $abort (param i32 i32)))
        (import "env" "assertFailure" (func $assert (param i32 i32 i32 i32 i32)))
        (import "env" "debugBreak" (func $brk))
        (import "env" "growMemory" (func $grow (param i32)))
        (import "env" "getHeapSize" (func $heap_size (result i32)))
        (import "env" "logNumber" (func $log_num (param i32 i32)))
        (import "env" "logFloat" (func $log_float (param i32 f64)))
        (import "env" "logString" (func $log_str (param i32)))

        (global $pages (mut i32) (i32.const 0))

        (func (export "initialize") (param i32)
            (global.set $pages (local.get 0)))
        (func (export "getStackBase") (result i32) (i32.const 40000))
        (func (export "initPages") (result i32) (global.get $pages))

        (func (export "doAbort")
            (call $abort (i32.const 100) (i32.const 2)))
        (func (export "doAssert")
            (call $assert (i32.const 200) (i32.const 42) (i32.const 220)
                          (i32.const 240) (i32.const 260)))
        (func (export "doAssertNoMsg")
            (call $assert (i32.const 200) (i32.const 7) (i32.const 220)
                          (i32.const 240) (i32.const 0)))
        (func (export "doBreak") (call $brk))
        (func (export "growBy") (param i32) (call $grow (local.get 0)))
        (func (export "heapSize") (result i32) (call $heap_size))
        (func (export "logTour")
            (call $log_num (i32.const 300) (i32.const 12))
            (call $log_float (i32.const 300) (f64.const 0.5))
            (call $log_str (i32.const 320)))
        (func (export "logBadPointer")
            (call $log_str (i32.const 262140)))

        (data (i32.const 100) "fatal: null pointer\00")
        (data (i32.const 200) "app/main.c\00")
        (data (i32.const 220) "UpdateApp\00")
        (data (i32.const 240) "ptr != nullptr\00")
        (data (i32.const 260) "bad handle\00")
        (data (i32.const 300) "frame\00")
        (data (i32.const 320) "hello from guest\00")
        (data (i32.const 1000) "stable\00")
        (data (i32.const 262140) "AAAA")
    )
"#;

/// Guest using the newer protocol: exports its heap base directly.
pub const GUEST_DIRECT_HEAP: &str = r#"
    (module
        (import "env" "memory" (memory 4))
        (func (export "initialize") (param i32))
        (func (export "getHeapBase") (result i32) (i32.const 70000))
    )
"#;

/// Guest calling an application-supplied import.
pub const GUEST_APP_IMPORT: &str = r#"
    (module
        (import "env" "memory" (memory 1))
        (import "env" "appMix" (func $mix (param i32 i32) (result i32)))
        (func (export "initialize") (param i32))
        (func (export "getStackBase") (result i32) (i32.const 0))
        (func (export "mix") (param i32 i32) (result i32)
            (call $mix (local.get 0) (local.get 1)))
    )
"#;

/// Start a session for `wat` with the given config and no app imports.
pub fn start_with_config(
    wat: &str,
    config: BridgeConfig,
) -> (Arc<RecordingSink>, BridgeSession) {
    let bridge = Bridge::new(wat.as_bytes(), config).unwrap();
    let sink = Arc::new(RecordingSink::new());
    let session = bridge
        .start_session(ImportTableBuilder::new(), sink.clone())
        .unwrap();
    (sink, session)
}

/// Start a session for `wat` with the default config.
pub fn start(wat: &str) -> (Arc<RecordingSink>, BridgeSession) {
    start_with_config(wat, BridgeConfig::default())
}
