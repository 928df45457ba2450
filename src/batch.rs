//! Packet batch and allocator contract consumed from the (out-of-scope)
//! packet buffer allocator and NIC I/O layer.
//!
//! This crate never allocates or parses packet memory itself; it only
//! moves opaque handles around and defers to the [`PacketAllocator`]
//! trait for anything that touches packet bytes.

/// An opaque handle to a single packet, owned by the external allocator.
pub type PacketHandle = u64;

/// Maximum number of packets carried by a single batch.
pub const MAX_BATCH_SIZE: usize = 32;

/// A bounded, counted vector of packet handles processed as a unit.
#[derive(Debug, Clone, Default)]
pub struct PacketBatch {
    handles: Vec<PacketHandle>,
}

impl PacketBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Creates a batch from existing handles, truncating to
    /// [`MAX_BATCH_SIZE`] if necessary.
    #[must_use]
    pub fn from_handles(mut handles: Vec<PacketHandle>) -> Self {
        handles.truncate(MAX_BATCH_SIZE);
        Self { handles }
    }

    /// Number of packets in the batch.
    #[must_use]
    pub fn cnt(&self) -> usize {
        self.handles.len()
    }

    /// Whether the batch carries no packets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Appends a packet handle, returning `false` if the batch is full.
    #[must_use]
    pub fn push(&mut self, handle: PacketHandle) -> bool {
        if self.handles.len() >= MAX_BATCH_SIZE {
            return false;
        }
        self.handles.push(handle);
        true
    }

    /// Borrows the packet handles in batch order.
    #[must_use]
    pub fn handles(&self) -> &[PacketHandle] {
        &self.handles
    }

    /// Drains all handles out of the batch, leaving it empty.
    pub fn drain(&mut self) -> Vec<PacketHandle> {
        std::mem::take(&mut self.handles)
    }
}

/// The allocator/packet contract consumed from the external buffer
/// library. A module class never calls the allocator directly outside of
/// these operations.
pub trait PacketAllocator: Send + Sync {
    /// Frees `n` packet handles back to the allocator in bulk.
    fn free_bulk(&self, handles: &[PacketHandle]);

    /// Pointer to the start of packet data for `handle`.
    fn head_data(&self, handle: PacketHandle) -> *const u8;

    /// Length of the packet data referenced by `handle`.
    fn data_len(&self, handle: PacketHandle) -> usize;

    /// Prepends `n` bytes of headroom to the packet, returning a pointer
    /// to the newly exposed region.
    fn prepend(&self, handle: PacketHandle, n: usize) -> *mut u8;

    /// Undoes a previous `prepend`/`adjust` of `n` bytes.
    fn adjust(&self, handle: PacketHandle, n: isize);
}
