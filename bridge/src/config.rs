//! Bridge configuration.

use pigwasm_hostapi::abi::MAX_MEMORY_PAGES;

use crate::error::BridgeError;

/// Configuration for one bridge session.
///
/// Controls the initial and maximum size of the shared memory region, the
/// heap-base safety margin, and whether the region is created shared.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Pages allocated before guest instantiation (1 page = 64 KiB).
    /// Must be non-zero.
    pub initial_pages: u32,

    /// Hard ceiling on region growth, in pages. Growth past this point
    /// fails with `MemoryLimitExceeded` at the requesting call site.
    /// Must not exceed `MAX_MEMORY_PAGES`. Default: 32768 pages = 2 GiB.
    pub max_pages: u64,

    /// Safety margin added to the guest's static-data boundary when the
    /// heap base has to be derived (older protocol variant). Ignored when
    /// the guest exports its heap base directly.
    pub safety_margin_bytes: u32,

    /// Create the region as a shared (atomic) memory. Concurrent-access
    /// guarantees apply only when set; the bridge itself still runs one
    /// session on one thread of control.
    pub shared_memory: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            initial_pages: 4,            // 256 KiB
            max_pages: MAX_MEMORY_PAGES, // 2 GiB
            safety_margin_bytes: 1024,
            shared_memory: false,
        }
    }
}

impl BridgeConfig {
    /// Reject configurations that can never produce a working session.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.initial_pages == 0 {
            return Err(BridgeError::config("initial_pages must be non-zero"));
        }
        if self.max_pages > MAX_MEMORY_PAGES {
            return Err(BridgeError::config(format!(
                "max_pages ({}) exceeds the {} page (2 GiB) ceiling",
                self.max_pages, MAX_MEMORY_PAGES
            )));
        }
        if u64::from(self.initial_pages) > self.max_pages {
            return Err(BridgeError::config(format!(
                "initial_pages ({}) exceeds max_pages ({})",
                self.initial_pages, self.max_pages
            )));
        }
        Ok(())
    }
}
