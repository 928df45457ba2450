//! The gate connection protocol.
//!
//! Igates are shared fan-in anchors, refcounted by their upstream list
//! length; ogates are unique per edge. Caching the downstream class and
//! argument on the ogate removes a lookup indirection from the hot batch
//! dispatch path.

use crate::error::EngineError;
use crate::gate::{Gate, OgateTarget};
use crate::module::{Graph, ModuleRef};

/// Connects ogate `ogate_idx` of `p` to igate `igate_idx` of `q`.
///
/// # Errors
///
/// - [`EngineError::InvalidArgument`] if `q`'s class has no
///   `process_batch`, or either index is out of range for its class or the
///   `max_gates` cap.
/// - [`EngineError::Busy`] if `p`'s ogate is already connected.
pub fn connect(
    graph: &mut Graph,
    p: &ModuleRef,
    ogate_idx: usize,
    q: &ModuleRef,
    igate_idx: usize,
) -> Result<(), EngineError> {
    if !q.class().has_process_batch() {
        return Err(EngineError::InvalidArgument(format!(
            "{} has no process_batch, cannot be a connect target",
            q.name()
        )));
    }
    if ogate_idx >= p.class().num_ogates() || ogate_idx >= graph.max_gates() {
        return Err(EngineError::InvalidArgument(format!(
            "ogate index {ogate_idx} out of range for {}",
            p.name()
        )));
    }
    if igate_idx >= q.class().num_igates() || igate_idx >= graph.max_gates() {
        return Err(EngineError::InvalidArgument(format!(
            "igate index {igate_idx} out of range for {}",
            q.name()
        )));
    }

    {
        let mut ogates = p.ogates().write();
        if !ogates.ensure_capacity(ogate_idx) {
            return Err(EngineError::OutOfMemory);
        }
        if ogates.is_active(ogate_idx) {
            return Err(EngineError::Busy);
        }
    }

    {
        let mut igates = q.igates().write();
        if !igates.ensure_capacity(igate_idx) {
            return Err(EngineError::OutOfMemory);
        }
        if !igates.is_active(igate_idx) {
            igates.install(igate_idx, Gate::new_igate(q.id(), igate_idx));
        }
    }

    let mut ogate = Gate::new_ogate(p.id(), ogate_idx);
    ogate.set_target(OgateTarget {
        module: q.clone(),
        igate_idx,
        class: q.class().clone(),
    });
    p.ogates().write().install(ogate_idx, ogate);

    q.igates()
        .write()
        .get_mut(igate_idx)
        .expect("igate installed above")
        .upstream_mut()
        .push((p.id(), ogate_idx));

    Ok(())
}

/// Disconnects ogate `ogate_idx` of `p`.
///
/// A no-op (returns `Ok(())`) if the slot was already inactive, so a
/// repeated disconnect is idempotent.
pub fn disconnect(p: &ModuleRef, ogate_idx: usize) -> Result<(), EngineError> {
    let taken = p.ogates().write().take(ogate_idx);
    let Some(gate) = taken else {
        return Ok(());
    };
    let Some(target) = gate.target().cloned() else {
        return Ok(());
    };

    let q = &target.module;
    let mut igates = q.igates().write();
    if let Some(igate) = igates.get_mut(target.igate_idx) {
        igate
            .upstream_mut()
            .retain(|&(owner, idx)| !(owner == p.id() && idx == ogate_idx));
        if igate.upstream().is_empty() {
            igates.take(target.igate_idx);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PacketBatch;
    use crate::dispatch::DispatchCtx;
    use crate::module::{ModuleClass, PrivState};
    use std::any::Any;
    use std::sync::Arc;

    /// Two ogates, two igates, so the boundary tests have both an
    /// in-range and an out-of-range index to exercise on each side.
    struct TwoGates;
    impl ModuleClass for TwoGates {
        fn name(&self) -> &str {
            "TwoGates"
        }
        fn num_igates(&self) -> usize {
            2
        }
        fn num_ogates(&self) -> usize {
            2
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
        Graph::new(64, 8, 64)
    }

    fn two_gates(g: &mut Graph, name: &str) -> ModuleRef {
        g.create_module(Some(name), Arc::new(TwoGates), &() as &dyn Any)
            .unwrap()
    }

    #[test]
    fn reconnecting_an_active_ogate_fails_busy_then_succeeds_after_disconnect() {
        let mut g = graph();
        let p = two_gates(&mut g, "p");
        let q = two_gates(&mut g, "q");
        let r = two_gates(&mut g, "r");

        connect(&mut g, &p, 0, &q, 0).unwrap();
        let err = connect(&mut g, &p, 0, &r, 1).unwrap_err();
        assert!(matches!(err, EngineError::Busy));

        disconnect(&p, 0).unwrap();
        connect(&mut g, &p, 0, &r, 1).unwrap();
        assert!(p.ogates().read().is_active(0));
    }

    #[test]
    fn disconnecting_an_already_inactive_ogate_is_a_no_op() {
        let mut g = graph();
        let p = two_gates(&mut g, "p");
        let q = two_gates(&mut g, "q");

        connect(&mut g, &p, 0, &q, 0).unwrap();
        disconnect(&p, 0).unwrap();
        disconnect(&p, 0).unwrap();
        assert!(!p.ogates().read().is_active(0));
    }

    #[test]
    fn ogate_index_at_num_ogates_is_rejected_one_less_succeeds() {
        let mut g = graph();
        let p = two_gates(&mut g, "p");
        let q = two_gates(&mut g, "q");

        let err = connect(&mut g, &p, 2, &q, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        connect(&mut g, &p, 1, &q, 0).unwrap();
        assert!(p.ogates().read().is_active(1));
    }

    #[test]
    fn igate_index_at_num_igates_is_rejected_one_less_succeeds() {
        let mut g = graph();
        let p = two_gates(&mut g, "p");
        let q = two_gates(&mut g, "q");

        let err = connect(&mut g, &p, 0, &q, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        connect(&mut g, &p, 0, &q, 1).unwrap();
        assert!(q.igates().read().is_active(1));
    }
}
