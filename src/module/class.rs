//! The module-class contract: an immutable descriptor
//! shared by every instance of a kind, exposing up to five optional hooks.
//!
//! Rust has no function-pointer table idiom as natural as trait objects, so
//! a module class is a `dyn ModuleClass` behind an `Arc`; each hook has a
//! default no-op body, making every one of them optional. A class that
//! does not override `process_batch` has no igates, and one that does not
//! override `run_task` may never register a task — both invariants are
//! enforced by the create/connect/register-task call sites, not by the
//! trait itself.

use std::any::Any;
use std::error::Error as StdError;

use crate::batch::PacketBatch;
use crate::dispatch::DispatchCtx;
use crate::module::ModuleRef;

/// Per-instance private state, produced by [`ModuleClass::init`].
///
/// Rather than a raw byte buffer of a class-declared size, state is a
/// type-erased boxed value that the class downcasts back to its own
/// concrete type in later hook calls.
pub type PrivState = Box<dyn Any + Send>;

/// An immutable descriptor of a module kind.
///
/// All instances created from the same `Arc<dyn ModuleClass>` share this
/// descriptor; only the [`PrivState`] produced by `init` varies per
/// instance.
pub trait ModuleClass: Send + Sync {
    /// Display name of the class, used for `tracing`/debug output and as
    /// the basis for default instance-name derivation when no explicit
    /// `def_module_name` is given.
    fn name(&self) -> &str;

    /// Overrides the default-name stem derived from [`ModuleClass::name`].
    /// Returning `None` falls back to CamelCase→snake_case conversion of
    /// `name()`.
    fn def_module_name(&self) -> Option<&str> {
        None
    }

    /// Compile-time ceiling on igate indices for this kind.
    fn num_igates(&self) -> usize {
        0
    }

    /// Compile-time ceiling on ogate indices for this kind.
    fn num_ogates(&self) -> usize {
        0
    }

    /// Runs once at instance creation, before the instance is visible to
    /// the namespace registry. Returning `Err` aborts creation; everything
    /// allocated so far is torn down and the error is propagated.
    fn init(
        &self,
        _arg: &dyn Any,
    ) -> Result<PrivState, Box<dyn StdError + Send + Sync>> {
        Ok(Box::new(()))
    }

    /// Runs once at instance destruction, before gates and tasks are torn
    /// down.
    fn deinit(&self, _instance: &ModuleRef, _state: &mut PrivState) {}

    /// Processes a batch arriving on igate `igate_idx`. A class without
    /// this hook has no igates — the default
    /// implementation is never reachable for such a class because
    /// `num_igates` is `0` and connect rejects any igate index.
    ///
    /// `ctx` lets the implementation emit further batches on its own
    /// ogates, continuing the depth-first traversal.
    fn process_batch(
        &self,
        _instance: &ModuleRef,
        _state: &mut PrivState,
        _igate_idx: usize,
        _batch: PacketBatch,
        _ctx: &mut DispatchCtx,
    ) {
    }

    /// Whether this class overrides [`ModuleClass::process_batch`]. Used
    /// by the connect protocol to reject connecting to a class with no
    /// real downstream handler.
    fn has_process_batch(&self) -> bool {
        false
    }

    /// Produces one batch when the scheduler invokes a task registered on
    /// this class, along with the ogate index to emit it on. Only classes
    /// that override this may register tasks.
    fn run_task(
        &self,
        _instance: &ModuleRef,
        _state: &mut PrivState,
        _task_arg: &dyn Any,
    ) -> Option<(PacketBatch, usize)> {
        None
    }

    /// Whether this class overrides [`ModuleClass::run_task`].
    fn has_run_task(&self) -> bool {
        false
    }

    /// Runs once per worker that first schedules a task belonging to an
    /// instance of this class, after the instance becomes visible to that
    /// worker and before its first task dispatch.
    fn init_worker(&self, _instance: &ModuleRef, _state: &mut PrivState) {}
}
