//! The per-worker task scheduler.
//!
//! Scheduling policy is an interface the engine consumes rather than
//! something it hard-codes. [`TaskScheduler`] is that interface;
//! [`RoundRobinScheduler`] is the one concrete policy this crate ships so
//! the engine is runnable without a caller supplying their own.

use crate::module::ModuleRef;
use crate::task::TaskId;

/// Picks the next `(module, task)` pair for a worker to run.
pub trait TaskScheduler: Send {
    /// Adds a task to this worker's schedule.
    fn add(&mut self, module: ModuleRef, task: TaskId);

    /// Removes every task belonging to `module` from this worker's
    /// schedule, e.g. because the module is being destroyed.
    fn remove_module(&mut self, module: &ModuleRef);

    /// Returns the next task to run, if any are scheduled.
    fn next(&mut self) -> Option<(ModuleRef, TaskId)>;

    /// All modules currently scheduled on this worker, for `init_worker`
    /// bookkeeping.
    fn modules(&self) -> Vec<ModuleRef>;
}

/// Round-robin over a flat list of `(module, task)` pairs.
#[derive(Default)]
pub struct RoundRobinScheduler {
    tasks: Vec<(ModuleRef, TaskId)>,
    cursor: usize,
}

impl RoundRobinScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskScheduler for RoundRobinScheduler {
    fn add(&mut self, module: ModuleRef, task: TaskId) {
        self.tasks.push((module, task));
    }

    fn remove_module(&mut self, module: &ModuleRef) {
        self.tasks.retain(|(m, _)| m.id() != module.id());
        if self.cursor >= self.tasks.len() {
            self.cursor = 0;
        }
    }

    fn next(&mut self) -> Option<(ModuleRef, TaskId)> {
        if self.tasks.is_empty() {
            return None;
        }
        let entry = self.tasks[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.tasks.len();
        Some(entry)
    }

    fn modules(&self) -> Vec<ModuleRef> {
        let mut seen = Vec::new();
        for (m, _) in &self.tasks {
            if !seen.iter().any(|s: &ModuleRef| s.id() == m.id()) {
                seen.push(m.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::class::ModuleClass;
    use crate::module::Graph;
    use std::sync::Arc;

    struct Pump;
    impl ModuleClass for Pump {
        fn name(&self) -> &str {
            "Pump"
        }
        fn has_run_task(&self) -> bool {
            true
        }
    }

    #[test]
    fn round_robin_cycles_every_task_once_per_round() {
        let mut g = Graph::new(64, 8, 64);
        let a = g.create_module(Some("a"), Arc::new(Pump), &()).unwrap();
        let b = g.create_module(Some("b"), Arc::new(Pump), &()).unwrap();

        let mut sched = RoundRobinScheduler::new();
        sched.add(a.clone(), TaskId(0));
        sched.add(b.clone(), TaskId(0));

        let first = sched.next().unwrap();
        let second = sched.next().unwrap();
        let third = sched.next().unwrap();
        assert_eq!(first.0.id(), a.id());
        assert_eq!(second.0.id(), b.id());
        assert_eq!(third.0.id(), a.id());
    }

    #[test]
    fn remove_module_drops_its_tasks() {
        let mut g = Graph::new(64, 8, 64);
        let a = g.create_module(Some("a"), Arc::new(Pump), &()).unwrap();
        let b = g.create_module(Some("b"), Arc::new(Pump), &()).unwrap();

        let mut sched = RoundRobinScheduler::new();
        sched.add(a.clone(), TaskId(0));
        sched.add(b.clone(), TaskId(0));
        sched.remove_module(&a);

        assert_eq!(sched.modules().len(), 1);
        assert_eq!(sched.next().unwrap().0.id(), b.id());
    }
}
