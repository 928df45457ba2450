//! Module instances, module classes, and the graph that owns them.

pub mod class;
pub mod naming;

pub use class::{ModuleClass, PrivState};

use std::any::Any;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fxhash::FxHashMap;
use spin::RwLock;

use crate::error::EngineError;
use crate::gate::connect;
use crate::gate::GateArray;
use crate::namespace::Namespace;
use crate::task::TaskRegistry;
use crate::worker::WorkerId;

/// A runtime-unique identifier for a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u64);

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

impl ModuleId {
    fn gen() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// A node in the processing graph: a name, its class, private state, gate
/// arrays, and its registered tasks.
pub struct ModuleInstance {
    id: ModuleId,
    name: String,
    class: Arc<dyn ModuleClass>,

    // Exclusive to whichever worker(s) currently run this module's tasks;
    // the engine never synchronizes access itself — if a
    // module runs on more than one worker, the class is responsible for any
    // internal synchronization of what lives inside this cell.
    state: UnsafeCell<PrivState>,

    // Mutated only by the control plane while workers are parked at the
    // pause barrier; read concurrently by any number of running workers.
    igates: RwLock<GateArray>,
    ogates: RwLock<GateArray>,
    tasks: RwLock<TaskRegistry>,

    active: AtomicBool,

    // Workers that have already run `init_worker` for this instance.
    // Latched per (worker, module) rather than globally, since a worker
    // only needs to see the instance once before it can schedule tasks
    // against it.
    workers_initialized: RwLock<Vec<WorkerId>>,
}

// SAFETY: `state` is only ever accessed while the owning worker(s) run a
// task or `process_batch` call for this instance; the pause barrier and the
// single-writer control plane ensure no other thread observes it
// concurrently with a control-plane mutation. Cross-worker sharing of a
// single instance is the class's own responsibility.
unsafe impl Sync for ModuleInstance {}

impl ModuleInstance {
    /// Runtime-unique id.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// The module's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module's class descriptor.
    #[must_use]
    pub fn class(&self) -> &Arc<dyn ModuleClass> {
        &self.class
    }

    /// Whether the module is still live (not mid-destruction).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn igates(&self) -> &RwLock<GateArray> {
        &self.igates
    }

    #[must_use]
    pub fn ogates(&self) -> &RwLock<GateArray> {
        &self.ogates
    }

    #[must_use]
    pub fn tasks(&self) -> &RwLock<TaskRegistry> {
        &self.tasks
    }

    /// Grants access to the instance's private state. Callers must only
    /// invoke this while holding the exclusive-execution guarantee the
    /// scheduler provides for the calling worker.
    ///
    /// # Safety
    ///
    /// The caller must not alias the returned reference with any other
    /// live access to this instance's state.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn state_mut(&self) -> &mut PrivState {
        &mut *self.state.get()
    }

    /// Whether `worker` has already had `init_worker` invoked for this
    /// instance; if not, marks it as having been invoked.
    pub(crate) fn mark_worker_initialized(&self, worker: WorkerId) -> bool {
        let mut guard = self.workers_initialized.write();
        if guard.contains(&worker) {
            true
        } else {
            guard.push(worker);
            false
        }
    }
}

/// A shared handle to a module instance.
pub type ModuleRef = Arc<ModuleInstance>;

/// The mutable module graph: the namespace registry plus every live
/// instance, owned by the control plane.
pub struct Graph {
    modules: FxHashMap<ModuleId, ModuleRef>,
    names: Namespace<String, ModuleId>,
    max_gates: usize,
    max_tasks_per_module: usize,
    module_name_len: usize,
}

impl Graph {
    /// Creates an empty graph using the given compile-time-style caps.
    #[must_use]
    pub fn new(max_gates: usize, max_tasks_per_module: usize, module_name_len: usize) -> Self {
        Self {
            modules: FxHashMap::default(),
            names: Namespace::new(),
            max_gates,
            max_tasks_per_module,
            module_name_len,
        }
    }

    /// The configured cap on gate-array indices.
    #[must_use]
    pub fn max_gates(&self) -> usize {
        self.max_gates
    }

    /// Looks a module up by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ModuleRef> {
        let id = self.names.lookup(&name.to_string())?;
        self.modules.get(id)
    }

    /// Looks a module up by id.
    #[must_use]
    pub fn lookup_id(&self, id: ModuleId) -> Option<&ModuleRef> {
        self.modules.get(&id)
    }

    /// Lists up to `max` module names starting at `offset`. Order is
    /// hash-bucket order, not stable across calls.
    #[must_use]
    pub fn list_modules(&self, offset: usize, max: usize) -> Vec<String> {
        self.names
            .keys()
            .skip(offset)
            .take(max)
            .cloned()
            .collect()
    }

    /// Creates a module instance.
    ///
    /// 1. Rejects a caller-supplied name that is already registered.
    /// 2. Runs `class.init`, propagating any error.
    /// 3. Registers the instance under the module namespace.
    ///
    /// On any failure, everything allocated during this call is released.
    pub fn create_module(
        &mut self,
        name: Option<&str>,
        class: Arc<dyn ModuleClass>,
        arg: &dyn Any,
    ) -> Result<ModuleRef, EngineError> {
        let name = match name {
            Some(n) => {
                let truncated = truncate_name(n, self.module_name_len);
                if self.names.contains(&truncated) {
                    return Err(EngineError::NameConflict(truncated));
                }
                truncated
            }
            None => {
                let stem =
                    naming::name_stem(class.def_module_name(), class.name());
                naming::first_free_name(&stem, |candidate| self.names.contains(&candidate.to_string()))
            }
        };

        let state = class
            .init(arg)
            .map_err(EngineError::ModuleInit)?;

        let id = ModuleId::gen();
        let instance = Arc::new(ModuleInstance {
            id,
            name: name.clone(),
            class,
            state: UnsafeCell::new(state),
            igates: RwLock::new(GateArray::new(self.max_gates)),
            ogates: RwLock::new(GateArray::new(self.max_gates)),
            tasks: RwLock::new(TaskRegistry::new(self.max_tasks_per_module)),
            active: AtomicBool::new(true),
            workers_initialized: RwLock::new(Vec::new()),
        });

        if let Err(err) = self.names.insert(name, id) {
            return Err(err);
        }
        self.modules.insert(id, instance.clone());
        Ok(instance)
    }

    /// Destroys a module: runs `deinit`,
    /// disconnects every upstream edge into its igates, disconnects every
    /// one of its ogates, destroys its tasks, then removes it from the
    /// namespace.
    ///
    /// The ordering (upstream first, then downstream, then tasks, then
    /// namespace) keeps invariants 1–2 true at every intermediate step, as
    /// observed by any reader.
    pub fn destroy_module(&mut self, name: &str) -> Result<(), EngineError> {
        let id = *self
            .names
            .lookup(&name.to_string())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;
        let instance = self
            .modules
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;

        instance.active.store(false, Ordering::Release);

        {
            // SAFETY: the control plane is the sole writer of module state
            // during destruction, and destruction only runs while workers
            // are parked at the pause barrier.
            let state = unsafe { instance.state_mut() };
            instance.class.deinit(&instance, state);
        }

        let igate_indices: Vec<usize> =
            instance.igates.read().active_indices().collect();
        for igate_idx in igate_indices {
            let upstream: Vec<(ModuleId, usize)> = instance
                .igates
                .read()
                .get(igate_idx)
                .map(|g| g.upstream().to_vec())
                .unwrap_or_default();
            for (p_id, ogate_idx) in upstream {
                if let Some(p) = self.modules.get(&p_id).cloned() {
                    let _ = connect::disconnect(&p, ogate_idx);
                }
            }
        }

        let ogate_indices: Vec<usize> =
            instance.ogates.read().active_indices().collect();
        for ogate_idx in ogate_indices {
            let _ = connect::disconnect(&instance, ogate_idx);
        }

        instance.tasks.write().clear();

        self.names.remove(&name.to_string());
        self.modules.remove(&id);

        Ok(())
    }
}

fn truncate_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        name.to_string()
    } else {
        name.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PacketBatch;
    use crate::dispatch::DispatchCtx;

    struct Sink;
    impl ModuleClass for Sink {
        fn name(&self) -> &str {
            "Sink"
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
            _batch: PacketBatch,
            _ctx: &mut DispatchCtx,
        ) {
        }
    }

    fn graph() -> Graph {
        Graph::new(64, 8, 128)
    }

    #[test]
    fn create_rejects_duplicate_explicit_name() {
        let mut g = graph();
        g.create_module(Some("a"), Arc::new(Sink), &()).unwrap();
        let err = g.create_module(Some("a"), Arc::new(Sink), &()).unwrap_err();
        assert!(matches!(err, EngineError::NameConflict(_)));
    }

    #[test]
    fn default_name_derivation_follows_camel_to_snake_and_numeric_suffix() {
        let mut g = graph();
        let m0 = g.create_module(None, Arc::new(Sink), &()).unwrap();
        let m1 = g.create_module(None, Arc::new(Sink), &()).unwrap();
        assert_eq!(m0.name(), "sink0");
        assert_eq!(m1.name(), "sink1");
    }

    #[test]
    fn destroy_then_create_same_name_yields_fresh_instance() {
        let mut g = graph();
        let first = g.create_module(Some("x"), Arc::new(Sink), &()).unwrap();
        g.destroy_module("x").unwrap();
        assert!(g.lookup("x").is_none());
        let second = g.create_module(Some("x"), Arc::new(Sink), &()).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn name_longer_than_cap_is_truncated() {
        let mut g = Graph::new(64, 8, 4);
        let m = g.create_module(Some("abcdefgh"), Arc::new(Sink), &()).unwrap();
        assert_eq!(m.name(), "abcd");
    }
}
