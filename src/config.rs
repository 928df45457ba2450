//! Engine-wide configuration, captured once at start and never mutated.

/// Upper bound on a module's gate-array length.
pub const MAX_GATES: usize = 8192;

/// Upper bound on the number of tasks a single module may register.
pub const MAX_TASKS_PER_MODULE: usize = 32;

/// Upper bound on a module's name length, in bytes.
pub const MODULE_NAME_LEN: usize = 128;

/// Immutable configuration for an [`Engine`](crate::engine::Engine),
/// captured once at construction time and never mutated afterward.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of pinned worker threads to spawn, one per dataplane CPU.
    pub num_workers: usize,
    /// Whether workers should pin themselves to a CPU core on startup.
    /// A pinning failure is logged and otherwise ignored; it is a
    /// performance hint, not a correctness requirement.
    pub pin_workers: bool,
    /// Cap on a module's gate-array length.
    pub max_gates: usize,
    /// Cap on tasks registrable per module.
    pub max_tasks_per_module: usize,
    /// Cap on module name length.
    pub module_name_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            pin_workers: true,
            max_gates: MAX_GATES,
            max_tasks_per_module: MAX_TASKS_PER_MODULE,
            module_name_len: MODULE_NAME_LEN,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Creates a builder seeded with [`EngineConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of pinned worker threads.
    #[must_use]
    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = n.max(1);
        self
    }

    /// Enables or disables CPU pinning of worker threads.
    #[must_use]
    pub fn pin_workers(mut self, enabled: bool) -> Self {
        self.config.pin_workers = enabled;
        self
    }

    /// Sets the gate-array cap.
    #[must_use]
    pub fn max_gates(mut self, n: usize) -> Self {
        self.config.max_gates = n;
        self
    }

    /// Sets the per-module task cap.
    #[must_use]
    pub fn max_tasks_per_module(mut self, n: usize) -> Self {
        self.config.max_tasks_per_module = n;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
