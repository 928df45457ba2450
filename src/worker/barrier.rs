//! The pause/resume barrier between the control plane and the worker pool.
//!
//! Two flags per worker: `request_pause`, set by the control plane and
//! cleared on resume, and one `paused` flag per worker, set by that worker
//! once it parks and cleared by the control plane to release it. Nothing
//! here takes a kernel lock; both sides only spin on `AtomicBool`s with
//! acquire/release ordering, so a worker never blocks in the kernel on the
//! hot dispatch path just because the control plane glanced at the barrier.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared pause/resume handshake for a fixed-size worker pool.
pub struct Barrier {
    request_pause: AtomicBool,
    paused: Vec<AtomicBool>,
}

impl Barrier {
    /// Creates a barrier for `num_workers` workers, initially not paused.
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        let mut paused = Vec::with_capacity(num_workers);
        paused.resize_with(num_workers, || AtomicBool::new(false));
        Self {
            request_pause: AtomicBool::new(false),
            paused,
        }
    }

    /// Number of workers this barrier tracks.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.paused.len()
    }

    /// Control plane: requests that every worker park at its next poll of
    /// [`Barrier::should_pause`].
    pub fn request_pause(&self) {
        self.request_pause.store(true, Ordering::Release);
    }

    /// Worker: whether it should stop dispatching and park.
    #[must_use]
    pub fn should_pause(&self) -> bool {
        self.request_pause.load(Ordering::Acquire)
    }

    /// Worker: marks itself parked.
    pub fn mark_paused(&self, worker: usize) {
        self.paused[worker].store(true, Ordering::Release);
    }

    /// Worker: whether it is still expected to remain parked.
    #[must_use]
    pub fn is_paused(&self, worker: usize) -> bool {
        self.paused[worker].load(Ordering::Acquire)
    }

    /// Control plane: whether every worker has reached the barrier.
    #[must_use]
    pub fn all_paused(&self) -> bool {
        self.paused.iter().all(|p| p.load(Ordering::Acquire))
    }

    /// Control plane: releases every parked worker and clears the pause
    /// request, in that order, so no worker observes a resume before the
    /// request flag it is still checking has been cleared.
    pub fn resume_all(&self) {
        for p in &self.paused {
            p.store(false, Ordering::Release);
        }
        self.request_pause.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_barrier_has_nobody_paused() {
        let b = Barrier::new(4);
        assert!(!b.should_pause());
        assert!(!b.all_paused());
    }

    #[test]
    fn all_paused_requires_every_worker() {
        let b = Barrier::new(3);
        b.request_pause();
        b.mark_paused(0);
        b.mark_paused(1);
        assert!(!b.all_paused());
        b.mark_paused(2);
        assert!(b.all_paused());
    }

    #[test]
    fn resume_clears_both_request_and_paused_flags() {
        let b = Barrier::new(2);
        b.request_pause();
        b.mark_paused(0);
        b.mark_paused(1);
        b.resume_all();
        assert!(!b.should_pause());
        assert!(!b.is_paused(0));
        assert!(!b.is_paused(1));
    }
}
