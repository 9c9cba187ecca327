//! C-string marshaling across the host–guest boundary.
//!
//! The guest hands the bridge byte offsets into the shared memory region;
//! each points at a null-terminated sequence of 8-bit code units. Decoding
//! maps every byte to one `char` — there is deliberately no multi-byte
//! (UTF-8) decoding, matching what guests emit for diagnostic text. Non-
//! ASCII payloads therefore come out as Latin-1, a documented limitation.
//!
//! There is no `write_cstring`: the guest never receives host-authored
//! strings in this system. The asymmetry is intentional.

use pigwasm_hostapi::MarshalError;

/// Decode the null-terminated string starting at `offset`.
///
/// Scans forward one byte at a time and treats byte value 0 as the
/// terminator. The guest guarantees the bytes stay stable for the duration
/// of the read; the bridge never mutates guest-owned string bytes.
///
/// Returns `OutOfBoundsRead` if `offset` is past the region end or no
/// terminator exists before it.
pub fn read_cstring(mem: &[u8], offset: u32) -> Result<String, MarshalError> {
    let start = offset as usize;
    if start > mem.len() {
        return Err(MarshalError::OutOfBoundsRead { offset, region_len: mem.len() });
    }
    match mem[start..].iter().position(|&b| b == 0) {
        Some(nul) => Ok(mem[start..start + nul].iter().map(|&b| b as char).collect()),
        None => Err(MarshalError::OutOfBoundsRead { offset, region_len: mem.len() }),
    }
}
