//! A poll-mode packet-processing dataplane kernel.
//!
//! Packet operators ("modules") are wired into a directed graph through
//! [`gate`]s and executed by pinned [`worker`] threads that run tight
//! polling loops over batches of packets. The control plane mutates the
//! graph only while workers are parked at the pause/resume barrier, so the
//! hot path never synchronizes per packet.
//!
//! # Layout
//!
//! - [`namespace`] — typed name → object registry.
//! - [`gate`] — gate arrays and the connect/disconnect protocol.
//! - [`module`] — module instances, module classes, default naming.
//! - [`task`] — per-module schedulable task registry.
//! - [`worker`] — pinned worker threads and the pause/resume barrier.
//! - [`dispatch`] — batch traversal through the graph, silent drops, taps.
//! - [`engine`] — the control-plane facade tying the above together.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gate;
pub mod module;
pub mod namespace;
pub mod tap;
pub mod task;
pub mod worker;

pub mod prelude {
    //! Common imports for building module classes against this crate.

    pub use crate::batch::{PacketAllocator, PacketBatch, PacketHandle};
    pub use crate::config::EngineConfig;
    pub use crate::dispatch::{DispatchCtx, WorkerStats};
    pub use crate::engine::Engine;
    pub use crate::error::EngineError;
    pub use crate::gate::{Gate, GateDirection};
    pub use crate::module::{ModuleClass, ModuleId, ModuleRef, PrivState};
    pub use crate::task::TaskId;
    pub use crate::worker::WorkerId;
}
