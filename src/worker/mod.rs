//! The pinned worker thread pool and its pause/resume barrier.
//!
//! Each worker owns a CPU-pinned OS thread that busy-polls its scheduler for
//! a task, runs it, and dispatches the resulting batch, forever — until the
//! control plane raises the pause request, at which point the worker parks
//! at [`Barrier`] instead of taking its next task. No step of the hot loop
//! ever takes a kernel-visible lock.

mod barrier;
pub mod scheduler;

pub use barrier::Barrier;
pub use scheduler::{RoundRobinScheduler, TaskScheduler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::warn;

use crate::batch::PacketAllocator;
use crate::dispatch::{self, WorkerStats, WorkerStatsSnapshot};
use crate::module::ModuleRef;
use crate::task::TaskId;

/// Identifies one worker in the pool by its pinned slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

/// A single pinned worker thread: its own scheduler, its own stats, and a
/// shared handle to the pool-wide pause/resume barrier.
pub struct Worker {
    id: WorkerId,
    running: Arc<AtomicBool>,
    barrier: Arc<Barrier>,
    stats: Arc<WorkerStats>,
    scheduler: spin::Mutex<Box<dyn TaskScheduler>>,
    allocator: Arc<dyn PacketAllocator>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        running: Arc<AtomicBool>,
        barrier: Arc<Barrier>,
        allocator: Arc<dyn PacketAllocator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            running,
            barrier,
            stats: Arc::new(WorkerStats::new()),
            scheduler: spin::Mutex::new(Box::new(RoundRobinScheduler::new())),
            allocator,
        })
    }

    /// This worker's pinned slot index.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// A snapshot of this worker's dispatch counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Schedules `task` belonging to `module` on this worker. Callers must
    /// only do this while the pool is paused.
    pub(crate) fn assign(&self, module: ModuleRef, task: TaskId) {
        self.scheduler.lock().add(module, task);
    }

    /// Removes every task belonging to `module` from this worker's
    /// schedule. Callers must only do this while the pool is paused.
    pub(crate) fn unassign_module(&self, module: &ModuleRef) {
        self.scheduler.lock().remove_module(module);
    }

    /// Spawns the pinned OS thread running this worker's poll loop.
    pub(crate) fn spawn(self: &Arc<Self>, pin_cpu: bool) -> JoinHandle<()> {
        let worker = self.clone();
        let name = format!("dplane-worker-{}", self.id.0);
        std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                if pin_cpu {
                    worker.pin_to_core();
                }
                worker.run();
            })
            .expect("failed to spawn worker thread")
    }

    fn pin_to_core(&self) {
        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        match core_ids.get(self.id.0 % core_ids.len().max(1)) {
            Some(core_id) if core_affinity::set_for_current(*core_id) => {}
            _ => warn!(worker = self.id.0, "failed to pin worker to a CPU core"),
        }
    }

    fn run(&self) {
        let mut initialized: Vec<crate::module::ModuleId> = Vec::new();
        while self.running.load(Ordering::Acquire) {
            if self.barrier.should_pause() {
                self.barrier.mark_paused(self.id.0);
                while self.barrier.is_paused(self.id.0) {
                    if !self.running.load(Ordering::Acquire) {
                        return;
                    }
                    std::hint::spin_loop();
                }
                initialized.clear();
                continue;
            }

            let next = self.scheduler.lock().next();
            let Some((module, task_id)) = next else {
                std::hint::spin_loop();
                continue;
            };

            self.ensure_init_worker(&module, &mut initialized);

            let Some((arg, first_ogate)) = self.run_task(&module, task_id) else {
                continue;
            };
            dispatch::dispatch_batch(
                &module,
                first_ogate,
                arg,
                self.allocator.as_ref(),
                self.stats.as_ref(),
                self.id,
            );
        }
    }

    fn ensure_init_worker(&self, module: &ModuleRef, initialized: &mut Vec<crate::module::ModuleId>) {
        if initialized.contains(&module.id()) {
            return;
        }
        initialized.push(module.id());
        if module.mark_worker_initialized(self.id) {
            return;
        }
        // SAFETY: this worker is the only one with scheduling rights over
        // `module` until the next pause, and `init_worker` runs at most
        // once per (worker, module) pair, before that module's first task
        // dispatch on this worker.
        let state = unsafe { module.state_mut() };
        module.class().init_worker(module, state);
    }

    fn run_task(
        &self,
        module: &ModuleRef,
        task_id: TaskId,
    ) -> Option<(crate::batch::PacketBatch, usize)> {
        let tasks = module.tasks().read();
        let task = tasks.get(task_id)?;
        let task_arg = task.arg();
        // SAFETY: see `ensure_init_worker` — this worker holds exclusive
        // scheduling rights over `module` for the duration of this call.
        let state = unsafe { module.state_mut() };
        module.class().run_task(module, state, task_arg)
    }
}

/// Owns the fixed-size pool of workers and the shared barrier the control
/// plane uses to pause and resume them for safe graph mutation.
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    barrier: Arc<Barrier>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_workers` pinned worker threads.
    #[must_use]
    pub fn spawn(num_workers: usize, pin_workers: bool, allocator: Arc<dyn PacketAllocator>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let barrier = Arc::new(Barrier::new(num_workers));
        let mut workers = Vec::with_capacity(num_workers);
        let mut handles = Vec::with_capacity(num_workers);

        for i in 0..num_workers {
            let worker = Worker::new(WorkerId(i), running.clone(), barrier.clone(), allocator.clone());
            handles.push(worker.spawn(pin_workers));
            workers.push(worker);
        }

        Self {
            workers,
            barrier,
            running,
            handles,
        }
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Borrows a worker by id.
    #[must_use]
    pub fn worker(&self, id: WorkerId) -> &Arc<Worker> {
        &self.workers[id.0]
    }

    /// Every worker in pinned-slot order.
    #[must_use]
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Requests every worker park at the barrier, then busy-waits until all
    /// have done so. Safe to mutate the graph once this
    /// returns.
    pub fn pause_all(&self) {
        self.barrier.request_pause();
        while !self.barrier.all_paused() {
            std::hint::spin_loop();
        }
    }

    /// Releases every parked worker.
    pub fn resume_all(&self) {
        self.barrier.resume_all();
    }

    /// Signals every worker to exit its poll loop and joins its thread.
    /// Callers must have paused the pool or otherwise be certain no worker
    /// is mid-dispatch before destroying the graph it references.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        self.barrier.resume_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
