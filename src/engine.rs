//! The control-plane facade.
//!
//! `Engine` owns the module graph and the worker pool and is the only
//! public entry point for mutating either. Every mutation pauses the pool
//! first, so no worker ever observes a half-built graph.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::batch::PacketAllocator;
use crate::config::EngineConfig;
use crate::dispatch::WorkerStatsSnapshot;
use crate::error::EngineError;
use crate::module::{Graph, ModuleClass, ModuleRef};
use crate::task::TaskId;
use crate::worker::{WorkerId, WorkerPool};

use spin::Mutex;

/// The top-level dataplane engine: module graph, worker pool, and
/// configuration, bundled behind one facade.
pub struct Engine {
    graph: Mutex<Graph>,
    pool: WorkerPool,
    config: EngineConfig,
}

impl Engine {
    /// Builds an engine and spawns its worker pool.
    #[must_use]
    pub fn new(config: EngineConfig, allocator: Arc<dyn PacketAllocator>) -> Self {
        let graph = Graph::new(config.max_gates, config.max_tasks_per_module, config.module_name_len);
        let pool = WorkerPool::spawn(config.num_workers, config.pin_workers, allocator);
        info!(workers = config.num_workers, "engine started");
        Self {
            graph: Mutex::new(graph),
            pool,
            config,
        }
    }

    /// The configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Creates a module instance.
    pub fn create_module(
        &self,
        name: Option<&str>,
        class: Arc<dyn ModuleClass>,
        arg: &dyn Any,
    ) -> Result<ModuleRef, EngineError> {
        self.pool.pause_all();
        let result = self.graph.lock().create_module(name, class, arg);
        self.pool.resume_all();
        result
    }

    /// Destroys a module instance by name.
    pub fn destroy_module(&self, name: &str) -> Result<(), EngineError> {
        self.pool.pause_all();
        let result = {
            let mut graph = self.graph.lock();
            let instance = graph.lookup(name).cloned();
            let result = graph.destroy_module(name);
            if result.is_ok() {
                if let Some(instance) = instance {
                    for worker in self.pool.workers() {
                        worker.unassign_module(&instance);
                    }
                }
            }
            result
        };
        self.pool.resume_all();
        result
    }

    /// Connects ogate `ogate_idx` of `p` to igate `igate_idx` of `q`.
    pub fn connect(
        &self,
        p: &ModuleRef,
        ogate_idx: usize,
        q: &ModuleRef,
        igate_idx: usize,
    ) -> Result<(), EngineError> {
        self.pool.pause_all();
        let mut graph = self.graph.lock();
        let result = crate::gate::connect::connect(&mut graph, p, ogate_idx, q, igate_idx);
        drop(graph);
        self.pool.resume_all();
        result
    }

    /// Disconnects ogate `ogate_idx` of `p`.
    pub fn disconnect(&self, p: &ModuleRef, ogate_idx: usize) -> Result<(), EngineError> {
        self.pool.pause_all();
        let result = crate::gate::connect::disconnect(p, ogate_idx);
        self.pool.resume_all();
        result
    }

    /// Registers a task on `module`, returning its id.
    ///
    /// The task is not yet scheduled anywhere; call
    /// [`Engine::assign_task`] to put it on a worker's schedule.
    pub fn register_task(
        &self,
        module: &ModuleRef,
        arg: Box<dyn Any + Send>,
    ) -> Result<TaskId, EngineError> {
        if !module.class().has_run_task() {
            return Err(EngineError::InvalidArgument(format!(
                "{} has no run_task, cannot register a task",
                module.name()
            )));
        }
        let id = module.tasks().write().register(arg);
        if id == crate::task::INVALID_TASK_ID {
            return Err(EngineError::OutOfMemory);
        }
        Ok(id)
    }

    /// Assigns an already-registered task to a worker's schedule. Pauses
    /// the pool for the duration of the assignment.
    pub fn assign_task(&self, worker: WorkerId, module: ModuleRef, task: TaskId) {
        self.pool.pause_all();
        self.pool.worker(worker).assign(module, task);
        self.pool.resume_all();
    }

    /// Looks a module up by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ModuleRef> {
        self.graph.lock().lookup(name).cloned()
    }

    /// Lists up to `max` module names starting at `offset`.
    #[must_use]
    pub fn list_modules(&self, offset: usize, max: usize) -> Vec<String> {
        self.graph.lock().list_modules(offset, max)
    }

    /// Parks every worker at the pause barrier, then returns once all have
    /// done so. Safe to mutate the graph directly until [`Engine::resume_all`]
    /// is called.
    pub fn pause_all(&self) {
        self.pool.pause_all();
    }

    /// Releases every parked worker.
    pub fn resume_all(&self) {
        self.pool.resume_all();
    }

    /// Installs a pcap tap on ogate `ogate_idx` of `module`, writing to the
    /// fifo at `path`.
    pub fn tcpdump_enable(
        &self,
        module: &ModuleRef,
        ogate_idx: usize,
        path: impl AsRef<Path>,
        network: u32,
    ) -> Result<(), EngineError> {
        self.pool.pause_all();
        let result = (|| {
            let tap = crate::tap::TapState::open(path, network).map_err(EngineError::Io)?;
            let mut ogates = module.ogates().write();
            let gate = ogates
                .get_mut(ogate_idx)
                .ok_or_else(|| EngineError::NotFound(format!("ogate {ogate_idx} on {}", module.name())))?;
            gate.install_tap(tap);
            Ok(())
        })();
        self.pool.resume_all();
        result
    }

    /// Removes a tap from ogate `ogate_idx` of `module`, if any.
    pub fn tcpdump_disable(&self, module: &ModuleRef, ogate_idx: usize) -> Result<(), EngineError> {
        self.pool.pause_all();
        let result = (|| {
            let mut ogates = module.ogates().write();
            let gate = ogates
                .get_mut(ogate_idx)
                .ok_or_else(|| EngineError::NotFound(format!("ogate {ogate_idx} on {}", module.name())))?;
            gate.remove_tap();
            Ok(())
        })();
        self.pool.resume_all();
        result
    }

    /// A per-worker dispatch-counter snapshot, in pinned-slot order.
    #[must_use]
    pub fn worker_stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.pool.workers().iter().map(|w| w.stats()).collect()
    }

    /// Shuts the engine down: signals every worker to exit and joins its
    /// thread. Consumes the engine, since no control-plane call is valid
    /// once the pool has stopped.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}
