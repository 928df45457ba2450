//! Batch dispatch: walking the graph downstream from a task's first emitted
//! batch, including the tap sink and the depth-first traversal a
//! `process_batch` hook continues by emitting further batches on its own
//! ogates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::batch::{PacketAllocator, PacketBatch};
use crate::gate::GateDirection;
use crate::module::ModuleRef;
use crate::worker::WorkerId;

/// Per-worker dispatch counters, read by the control plane between
/// batches. A hot-path atomic-counter struct, separate from the plain
/// snapshot struct handed to callers outside the hot path.
#[derive(Default)]
pub struct WorkerStats {
    batches_processed: AtomicU64,
    packets_processed: AtomicU64,
    silent_drops: AtomicU64,
}

/// A point-in-time copy of [`WorkerStats`], safe to hold past the instant
/// it was taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub batches_processed: u64,
    pub packets_processed: u64,
    pub silent_drops: u64,
}

impl WorkerStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_batch(&self, len: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.packets_processed
            .fetch_add(len as u64, Ordering::Relaxed);
    }

    fn record_silent_drop(&self, len: usize) {
        self.silent_drops.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot for reporting; individual fields
    /// may be a batch or two stale relative to each other since there is no
    /// shared lock across the three counters.
    #[must_use]
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            packets_processed: self.packets_processed.load(Ordering::Relaxed),
            silent_drops: self.silent_drops.load(Ordering::Relaxed),
        }
    }
}

/// Per-dispatch-call context threaded through `process_batch`: the packet
/// allocator and the worker's stats, so a hook can emit further batches on
/// its own ogates without a second lookup of either.
pub struct DispatchCtx<'a> {
    allocator: &'a dyn PacketAllocator,
    stats: &'a WorkerStats,
    worker: WorkerId,
}

impl<'a> DispatchCtx<'a> {
    fn new(allocator: &'a dyn PacketAllocator, stats: &'a WorkerStats, worker: WorkerId) -> Self {
        Self {
            allocator,
            stats,
            worker,
        }
    }

    /// Emits `batch` on `from_module`'s ogate `ogate_idx`, continuing the
    /// depth-first traversal.
    pub fn emit(&mut self, from_module: &ModuleRef, ogate_idx: usize, batch: PacketBatch) {
        dispatch_batch(from_module, ogate_idx, batch, self.allocator, self.stats, self.worker);
    }
}

/// Runs one task's produced batch through the graph, starting at
/// `from_module`'s ogate `ogate_idx`.
///
/// - A batch landing on an inactive or dead-end ogate is silently dropped
///   and its handles freed.
/// - An active ogate with an enabled tap writes each packet to it before
///   forwarding.
/// - The first time the calling worker reaches a given downstream instance,
///   its `init_worker` hook runs before `process_batch` does.
/// - The downstream class's cached `process_batch` is invoked with the
///   batch; that call may itself emit further batches on its own ogates,
///   which is why this function recurses through [`DispatchCtx::emit`]
///   rather than looping.
pub fn dispatch_batch(
    from_module: &ModuleRef,
    ogate_idx: usize,
    batch: PacketBatch,
    allocator: &dyn PacketAllocator,
    stats: &WorkerStats,
    worker: WorkerId,
) {
    #[cfg(feature = "trace")]
    let _span = tracing::trace_span!("dispatch", module = %from_module.name(), ogate = ogate_idx)
        .entered();

    let (has_enabled_tap, target) = {
        let ogates = from_module.ogates().read();
        let Some(gate) = ogates.get(ogate_idx) else {
            drop(ogates);
            silent_drop(batch, allocator, stats);
            return;
        };
        debug_assert_eq!(gate.direction(), GateDirection::Out);
        let has_enabled_tap = gate.tap().is_some_and(|t| t.is_enabled());
        let target = gate.target().cloned();
        (has_enabled_tap, target)
    };

    if has_enabled_tap {
        tap_batch(from_module, ogate_idx, &batch, allocator);
    }

    let Some(target) = target else {
        silent_drop(batch, allocator, stats);
        return;
    };

    stats.record_batch(batch.cnt());

    // SAFETY: the calling worker holds exclusive scheduling rights over the
    // downstream instance's state for the duration of this call; no other
    // worker runs a task or `process_batch` against the same instance
    // concurrently.
    if !target.module.mark_worker_initialized(worker) {
        let state = unsafe { target.module.state_mut() };
        target.class.init_worker(&target.module, state);
    }

    let state = unsafe { target.module.state_mut() };
    let mut ctx = DispatchCtx::new(allocator, stats, worker);
    target
        .class
        .process_batch(&target.module, state, target.igate_idx, batch, &mut ctx);
}

fn silent_drop(batch: PacketBatch, allocator: &dyn PacketAllocator, stats: &WorkerStats) {
    stats.record_silent_drop(batch.cnt());
    allocator.free_bulk(batch.handles());
}

fn tap_batch(
    from_module: &ModuleRef,
    ogate_idx: usize,
    batch: &PacketBatch,
    allocator: &dyn PacketAllocator,
) {
    let (ts_sec, ts_usec) = now_pcap_timestamp();
    let mut ogates = from_module.ogates().write();
    let Some(gate) = ogates.get_mut(ogate_idx) else {
        return;
    };
    let Some(tap) = gate.tap_mut() else {
        return;
    };
    for &handle in batch.handles() {
        let data = unsafe {
            std::slice::from_raw_parts(allocator.head_data(handle), allocator.data_len(handle))
        };
        // A write error other than EPIPE aborts this batch's tap writes
        // without disabling the tap; `TapState::write_packet`
        // itself handles EPIPE by disabling.
        let _ = tap.write_packet(ts_sec, ts_usec, data);
    }
}

fn now_pcap_timestamp() -> (u32, u32) {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (dur.as_secs() as u32, dur.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::connect;
    use crate::module::class::{ModuleClass, PrivState};
    use crate::module::Graph;
    use std::any::Any;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingSink {
        hits: Arc<AtomicUsize>,
    }
    impl ModuleClass for CountingSink {
        fn name(&self) -> &str {
            "CountingSink"
        }
        fn num_igates(&self) -> usize {
            1
        }
        fn has_process_batch(&self) -> bool {
            true
        }
        fn process_batch(
            &self,
            _instance: &ModuleRef,
            _state: &mut PrivState,
            _igate_idx: usize,
            batch: PacketBatch,
            ctx: &mut DispatchCtx,
        ) {
            self.hits.fetch_add(batch.cnt(), Ordering::Relaxed);
            ctx.allocator.free_bulk(batch.handles());
        }
    }

    struct Source;
    impl ModuleClass for Source {
        fn name(&self) -> &str {
            "Source"
        }
        fn num_ogates(&self) -> usize {
            1
        }
    }

    struct NullAllocator;
    impl PacketAllocator for NullAllocator {
        fn free_bulk(&self, _handles: &[crate::batch::PacketHandle]) {}
        fn head_data(&self, _handle: crate::batch::PacketHandle) -> *const u8 {
            std::ptr::null()
        }
        fn data_len(&self, _handle: crate::batch::PacketHandle) -> usize {
            0
        }
        fn prepend(&self, _handle: crate::batch::PacketHandle, _n: usize) -> *mut u8 {
            std::ptr::null_mut()
        }
        fn adjust(&self, _handle: crate::batch::PacketHandle, _n: isize) {}
    }

    #[test]
    fn dispatch_to_connected_ogate_invokes_downstream_process_batch() {
        let mut g = Graph::new(64, 8, 64);
        let hits = Arc::new(AtomicUsize::new(0));
        let src = g.create_module(Some("src"), Arc::new(Source), &() as &dyn Any).unwrap();
        let sink = g
            .create_module(
                Some("sink"),
                Arc::new(CountingSink { hits: hits.clone() }),
                &(),
            )
            .unwrap();
        connect::connect(&mut g, &src, 0, &sink, 0).unwrap();

        let stats = WorkerStats::new();
        let alloc = NullAllocator;
        let batch = PacketBatch::from_handles(vec![1, 2, 3]);
        dispatch_batch(&src, 0, batch, &alloc, &stats, crate::worker::WorkerId(0));

        assert_eq!(hits.load(Ordering::Relaxed), 3);
        assert_eq!(stats.snapshot().batches_processed, 1);
        assert_eq!(stats.snapshot().silent_drops, 0);
    }

    #[test]
    fn dispatch_to_dead_end_ogate_counts_a_silent_drop() {
        let mut g = Graph::new(64, 8, 64);
        let src = g.create_module(Some("src"), Arc::new(Source), &() as &dyn Any).unwrap();
        let stats = WorkerStats::new();
        let alloc = NullAllocator;
        let batch = PacketBatch::from_handles(vec![1, 2]);
        dispatch_batch(&src, 0, batch, &alloc, &stats, crate::worker::WorkerId(0));

        assert_eq!(stats.snapshot().silent_drops, 2);
        assert_eq!(stats.snapshot().batches_processed, 0);
    }
}
