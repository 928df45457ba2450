//! Gates: directed half-edges attached to a module at a specific index.

pub mod array;
pub mod connect;

use std::sync::Arc;

use crate::module::{ModuleClass, ModuleId, ModuleRef};
use crate::tap::TapState;

pub use array::GateArray;

/// Whether a [`Gate`] is an incoming or outgoing half-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDirection {
    /// An igate: a shared fan-in anchor, refcounted by its upstream list.
    In,
    /// An ogate: uniquely owned by its source module.
    Out,
}

/// The far end of an ogate: the igate it targets, plus a cache of the
/// downstream class's dispatch hook so the hot path never has to look the
/// target module up by id.
#[derive(Clone)]
pub struct OgateTarget {
    /// The module owning the target igate, held directly so dispatch never
    /// looks the target up by id.
    pub module: ModuleRef,
    /// The target igate's index on that module.
    pub igate_idx: usize,
    /// Cached downstream class, so `process_batch` dispatch skips a field
    /// indirection through `module`.
    pub class: Arc<dyn ModuleClass>,
}

/// A single gate slot: either an igate (with an upstream list of ogates
/// pointing at it) or an ogate (with a target igate and, optionally, a tap).
pub struct Gate {
    owner: ModuleId,
    index: usize,
    direction: GateDirection,

    /// Populated for ogates only: the connected igate and cached dispatch.
    target: Option<OgateTarget>,
    /// Populated for igates only: every ogate currently pointing here.
    upstream: Vec<(ModuleId, usize)>,

    /// Populated for ogates only: pcap tap sink state.
    tap: Option<TapState>,
}

impl Gate {
    pub(crate) fn new_igate(owner: ModuleId, index: usize) -> Self {
        Self {
            owner,
            index,
            direction: GateDirection::In,
            target: None,
            upstream: Vec::new(),
            tap: None,
        }
    }

    pub(crate) fn new_ogate(owner: ModuleId, index: usize) -> Self {
        Self {
            owner,
            index,
            direction: GateDirection::Out,
            target: None,
            upstream: Vec::new(),
            tap: None,
        }
    }

    /// The module that owns this gate slot.
    #[must_use]
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    /// The index of this gate within its owner's gate array.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this is an igate or an ogate.
    #[must_use]
    pub fn direction(&self) -> GateDirection {
        self.direction
    }

    /// For an ogate, the igate it targets (module + index + cached class).
    #[must_use]
    pub fn target(&self) -> Option<&OgateTarget> {
        self.target.as_ref()
    }

    /// For an igate, the ogates currently pointing at it.
    #[must_use]
    pub fn upstream(&self) -> &[(ModuleId, usize)] {
        &self.upstream
    }

    pub(crate) fn upstream_mut(&mut self) -> &mut Vec<(ModuleId, usize)> {
        &mut self.upstream
    }

    pub(crate) fn set_target(&mut self, target: OgateTarget) {
        debug_assert_eq!(self.direction, GateDirection::Out);
        self.target = Some(target);
    }

    /// Tap state attached to this ogate, if a tap is installed.
    #[must_use]
    pub fn tap(&self) -> Option<&TapState> {
        self.tap.as_ref()
    }

    /// Mutably borrows the tap state attached to this ogate, if any.
    pub fn tap_mut(&mut self) -> Option<&mut TapState> {
        self.tap.as_mut()
    }

    pub(crate) fn install_tap(&mut self, tap: TapState) {
        self.tap = Some(tap);
    }

    pub(crate) fn remove_tap(&mut self) -> Option<TapState> {
        self.tap.take()
    }
}
