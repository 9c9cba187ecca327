//! Marshaling error type for host–guest string crossings.

/// Failure while decoding a guest-supplied string offset.
///
/// A C-string read scans forward one byte at a time until it finds a NUL
/// terminator. Running off the end of the region without one indicates a
/// host/guest protocol mismatch (a bad pointer or unterminated payload)
/// and is terminal for the operation that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    /// The scan at `offset` reached the end of the region (`region_len`
    /// bytes) without finding a terminator.
    #[error(
        "string read at offset {offset} ran past the region end \
         ({region_len} bytes) without a NUL terminator"
    )]
    OutOfBoundsRead { offset: u32, region_len: usize },
}

impl MarshalError {
    /// The offset the failed read started from.
    pub fn offset(&self) -> u32 {
        match self {
            Self::OutOfBoundsRead { offset, .. } => *offset,
        }
    }
}
