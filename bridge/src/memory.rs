//! Shared memory region ownership, growth, and heap-base accounting.
//!
//! The region is created by the host before guest instantiation and handed
//! to the guest as the `env.memory` import. Growth is page-granular and
//! append-only: the guest's own allocator holds raw offsets into the region
//! that must stay valid across growth, so no compacting or relocating
//! strategy is ever applied. The region never shrinks.

use wasmtime::{AsContext, AsContextMut, Engine, Extern, Memory, MemoryType, SharedMemory};

use pigwasm_hostapi::abi::WASM_PAGE_SIZE;

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// The shared growable memory region, local or shared (atomic).
///
/// Both variants are handles; cloning is cheap and refers to the same
/// underlying region. The `Shared` variant exists for the threads-proposal
/// configuration — the bridge itself still drives one session from one
/// thread of control.
#[derive(Debug, Clone)]
pub enum GuestRegion {
    Local(Memory),
    Shared(SharedMemory),
}

impl GuestRegion {
    /// Current size in pages.
    pub fn size_pages<T: 'static>(&self, ctx: &impl AsContext<Data = T>) -> u64 {
        match self {
            Self::Local(mem) => mem.size(ctx),
            Self::Shared(mem) => mem.size(),
        }
    }

    /// Current byte length.
    pub fn len_bytes<T: 'static>(&self, ctx: &impl AsContext<Data = T>) -> usize {
        match self {
            Self::Local(mem) => mem.data_size(ctx),
            Self::Shared(mem) => mem.data_size(),
        }
    }

    /// View the region contents as a byte slice.
    pub fn data<'a, T: 'static>(&'a self, ctx: &'a impl AsContext<Data = T>) -> &'a [u8] {
        match self {
            Self::Local(mem) => mem.data(ctx),
            Self::Shared(mem) => {
                let cells = mem.data();
                // One thread of control per session: nothing mutates the
                // region while the host holds this view.
                unsafe { std::slice::from_raw_parts(cells.as_ptr().cast::<u8>(), cells.len()) }
            }
        }
    }

    /// Append `pages` pages. Returns the previous size in pages.
    fn grow_raw<T: 'static>(
        &self,
        ctx: &mut impl AsContextMut<Data = T>,
        pages: u64,
    ) -> Result<u64, anyhow::Error> {
        match self {
            Self::Local(mem) => mem.grow(ctx, pages),
            Self::Shared(mem) => mem.grow(pages),
        }
    }

    /// The `Extern` to define as the guest's `env.memory` import.
    pub fn as_extern(&self) -> Extern {
        match self {
            Self::Local(mem) => Extern::Memory(*mem),
            Self::Shared(mem) => Extern::SharedMemory(mem.clone()),
        }
    }
}

/// Which protocol variant supplied the heap-base candidate.
///
/// Newer guests export their heap base directly; older ones only export the
/// end of their static data, and the host derives the heap base from it.
/// Both are supported; the choice is logged at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapBaseSource {
    /// Guest-exported heap base, used verbatim.
    Direct(u32),
    /// Guest static-data boundary plus a safety margin, rounded up to the
    /// next page boundary.
    Derived { boundary: u32, margin: u32 },
}

/// Owner of the shared region handle and the heap-base accounting.
#[derive(Debug, Clone)]
pub struct MemoryManager {
    region: GuestRegion,
    max_pages: u64,
    heap_base: Option<u32>,
}

impl MemoryManager {
    /// Construct the region with exactly `config.initial_pages` pages and a
    /// hard maximum of `config.max_pages`, honoring the shared-memory flag.
    ///
    /// Fails with `Configuration` if `initial_pages` is zero or the runtime
    /// rejects the memory type.
    pub fn allocate_initial_region<T: 'static>(
        engine: &Engine,
        ctx: &mut impl AsContextMut<Data = T>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let region = if config.shared_memory {
            let ty = MemoryType::shared(config.initial_pages, config.max_pages as u32);
            let mem = SharedMemory::new(engine, ty).map_err(|e| {
                BridgeError::Configuration(format!("shared region allocation failed: {}", e))
            })?;
            GuestRegion::Shared(mem)
        } else {
            let ty = MemoryType::new(config.initial_pages, Some(config.max_pages as u32));
            let mem = Memory::new(&mut *ctx, ty).map_err(|e| {
                BridgeError::Configuration(format!("region allocation failed: {}", e))
            })?;
            GuestRegion::Local(mem)
        };
        Ok(Self {
            region,
            max_pages: config.max_pages,
            heap_base: None,
        })
    }

    /// Handle to the underlying region.
    pub fn region(&self) -> &GuestRegion {
        &self.region
    }

    /// Append `pages` pages to the region. Returns the new byte length.
    ///
    /// Previously returned byte offsets stay valid: growth only ever appends
    /// pages at the end. Refusal (the `max_pages` ceiling, or the engine
    /// running out of reservation) is `MemoryLimitExceeded` and propagates
    /// to whichever call site requested the growth.
    pub fn grow<T: 'static>(
        &self,
        ctx: &mut impl AsContextMut<Data = T>,
        pages: u64,
    ) -> Result<u64, BridgeError> {
        let current_pages = self.region.size_pages(&*ctx);
        let refused = |requested_pages| BridgeError::MemoryLimitExceeded {
            requested_pages,
            current_pages,
            max_pages: self.max_pages,
        };
        if current_pages + pages > self.max_pages {
            return Err(refused(pages));
        }
        self.region.grow_raw(ctx, pages).map_err(|_| refused(pages))?;
        Ok(self.region.len_bytes(&*ctx) as u64)
    }

    /// Fix the heap base for this session. Called exactly once, after the
    /// guest has exported its heap-layout metadata; a second call is an
    /// `InvariantViolation`.
    pub fn establish_heap_base(&mut self, source: HeapBaseSource) -> Result<u32, BridgeError> {
        if self.heap_base.is_some() {
            return Err(BridgeError::InvariantViolation(
                "heap base already established for this session".into(),
            ));
        }
        let heap_base = match source {
            HeapBaseSource::Direct(addr) => {
                tracing::debug!(heap_base = addr, "using guest-exported heap base");
                addr
            }
            HeapBaseSource::Derived { boundary, margin } => {
                let derived = derive_heap_base(boundary, margin);
                tracing::debug!(
                    boundary,
                    margin,
                    heap_base = derived,
                    "derived heap base from guest static-data boundary"
                );
                derived
            }
        };
        self.heap_base = Some(heap_base);
        Ok(heap_base)
    }

    /// The established heap base, if any.
    pub fn heap_base(&self) -> Option<u32> {
        self.heap_base
    }

    /// Bytes between the heap base and the region end. Pure read; before
    /// the heap base is established the whole region counts as free.
    pub fn free_bytes<T: 'static>(&self, ctx: &impl AsContext<Data = T>) -> u64 {
        let len = self.region.len_bytes(ctx) as u64;
        len.saturating_sub(u64::from(self.heap_base.unwrap_or(0)))
    }
}

/// Round `boundary + margin` up to the next multiple of the page size.
///
/// The result is page-aligned and never below the boundary plus margin, so
/// the guest allocator's first byte cannot overlap static data.
pub fn derive_heap_base(boundary: u32, margin: u32) -> u32 {
    let candidate = u64::from(boundary) + u64::from(margin);
    let page = u64::from(WASM_PAGE_SIZE);
    (candidate.div_ceil(page) * page) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Config, Store};

    fn test_manager(initial_pages: u32, max_pages: u64) -> (Store<()>, MemoryManager) {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let config = BridgeConfig {
            initial_pages,
            max_pages,
            ..Default::default()
        };
        let manager =
            MemoryManager::allocate_initial_region(&engine, &mut store, &config).unwrap();
        (store, manager)
    }

    #[test]
    fn test_initial_region_length() {
        for pages in [1u32, 4, 7] {
            let (store, manager) = test_manager(pages, 32768);
            assert_eq!(
                manager.region().len_bytes(&store),
                pages as usize * 65536
            );
        }
    }

    #[test]
    fn test_zero_pages_is_configuration_error() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let config = BridgeConfig { initial_pages: 0, ..Default::default() };
        let err =
            MemoryManager::allocate_initial_region(&engine, &mut store, &config).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn test_grow_is_monotonic_and_page_granular() {
        let (mut store, manager) = test_manager(2, 16);
        let before = manager.region().len_bytes(&store);
        let new_len = manager.grow(&mut store, 3).unwrap();
        assert_eq!(new_len, 5 * 65536);
        assert!(new_len as usize > before);
        assert_eq!(new_len % 65536, 0);
    }

    #[test]
    fn test_grow_preserves_prior_offsets() {
        let (mut store, manager) = test_manager(1, 16);
        let GuestRegion::Local(mem) = manager.region().clone() else {
            unreachable!()
        };
        mem.write(&mut store, 1000, b"stable").unwrap();
        manager.grow(&mut store, 4).unwrap();
        assert_eq!(&manager.region().data(&store)[1000..1006], b"stable");
    }

    #[test]
    fn test_grow_past_ceiling_is_memory_limit() {
        let (mut store, manager) = test_manager(4, 6);
        let err = manager.grow(&mut store, 3).unwrap_err();
        match err {
            BridgeError::MemoryLimitExceeded {
                requested_pages,
                current_pages,
                max_pages,
            } => {
                assert_eq!(requested_pages, 3);
                assert_eq!(current_pages, 4);
                assert_eq!(max_pages, 6);
            }
            other => panic!("expected MemoryLimitExceeded, got {:?}", other),
        }
        // The failed grow must not have changed the region.
        assert_eq!(manager.region().size_pages(&store), 4);
    }

    #[test]
    fn test_shared_region_allocate_grow_and_read() {
        let mut wasm_config = Config::new();
        wasm_config.wasm_threads(true);
        let engine = Engine::new(&wasm_config).unwrap();
        let mut store = Store::new(&engine, ());
        let config = BridgeConfig {
            initial_pages: 2,
            max_pages: 4,
            shared_memory: true,
            ..Default::default()
        };
        let manager =
            MemoryManager::allocate_initial_region(&engine, &mut store, &config).unwrap();
        let GuestRegion::Shared(mem) = manager.region().clone() else {
            panic!("shared_memory config must produce a shared region");
        };
        assert_eq!(manager.region().len_bytes(&store), 2 * 65536);

        // Write through the shared cells, as a guest would through its
        // imported memory.
        unsafe {
            *mem.data()[1000].get() = b's';
        }
        assert_eq!(manager.region().data(&store)[1000], b's');

        let new_len = manager.grow(&mut store, 1).unwrap();
        assert_eq!(new_len, 3 * 65536);
        assert_eq!(manager.region().size_pages(&store), 3);
        // Prior offsets survive shared growth too.
        assert_eq!(manager.region().data(&store)[1000], b's');

        // The configured ceiling applies to the shared variant as well.
        let err = manager.grow(&mut store, 5).unwrap_err();
        assert!(matches!(err, BridgeError::MemoryLimitExceeded { .. }));
    }

    #[test]
    fn test_derive_heap_base_rounds_up_to_page() {
        assert_eq!(derive_heap_base(40000, 1024), 65536);
        assert_eq!(derive_heap_base(0, 0), 0);
        assert_eq!(derive_heap_base(65536, 0), 65536);
        assert_eq!(derive_heap_base(65537, 0), 2 * 65536);
        assert_eq!(derive_heap_base(65536, 1024), 2 * 65536);
    }

    #[test]
    fn test_establish_heap_base_once() {
        let (_store, mut manager) = test_manager(4, 32768);
        assert_eq!(manager.heap_base(), None);
        let base = manager
            .establish_heap_base(HeapBaseSource::Derived { boundary: 40000, margin: 1024 })
            .unwrap();
        assert_eq!(base, 65536);
        assert_eq!(manager.heap_base(), Some(65536));

        let err = manager
            .establish_heap_base(HeapBaseSource::Direct(131072))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvariantViolation(_)));
        assert_eq!(manager.heap_base(), Some(65536));
    }

    #[test]
    fn test_direct_heap_base_is_verbatim() {
        let (_store, mut manager) = test_manager(4, 32768);
        // Not page-aligned on purpose: the direct protocol trusts the guest.
        let base = manager
            .establish_heap_base(HeapBaseSource::Direct(41024))
            .unwrap();
        assert_eq!(base, 41024);
    }

    #[test]
    fn test_free_bytes() {
        let (mut store, mut manager) = test_manager(4, 32768);
        assert_eq!(manager.free_bytes(&store), 4 * 65536);
        manager
            .establish_heap_base(HeapBaseSource::Direct(65536))
            .unwrap();
        assert_eq!(manager.free_bytes(&store), 3 * 65536);
        manager.grow(&mut store, 1).unwrap();
        assert_eq!(manager.free_bytes(&store), 4 * 65536);
    }
}
