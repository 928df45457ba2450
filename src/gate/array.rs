//! A dynamic, grow-on-demand array of gate slots.
//!
//! Starts empty, grows by doubling, capped at `max_gates`. A slot is
//! active iff its entry is `Some`.

use crate::gate::Gate;

/// A per-module array of gate slots, owned by that module.
pub struct GateArray {
    slots: Vec<Option<Gate>>,
    max_gates: usize,
}

impl GateArray {
    /// Creates an empty gate array capped at `max_gates`.
    #[must_use]
    pub fn new(max_gates: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_gates,
        }
    }

    /// The allocated length of the backing slot vector.
    #[must_use]
    pub fn curr_size(&self) -> usize {
        self.slots.len()
    }

    /// Whether `index` is within the allocated range and holds a gate.
    #[must_use]
    pub fn is_active(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Option::is_some)
    }

    /// Borrows the gate at `index`, if active.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Gate> {
        self.slots.get(index)?.as_ref()
    }

    /// Mutably borrows the gate at `index`, if active.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Gate> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Grows the array by doubling until it covers `index`, capped at
    /// `max_gates`. Returns `false` if `index` cannot be covered within the
    /// cap.
    #[must_use]
    pub fn ensure_capacity(&mut self, index: usize) -> bool {
        if index >= self.max_gates {
            return false;
        }
        if self.slots.len() > index {
            return true;
        }
        let mut new_len = self.slots.len().max(1);
        while new_len <= index {
            new_len = (new_len * 2).min(self.max_gates);
        }
        self.slots.resize_with(new_len, || None);
        self.slots.len() > index
    }

    /// Installs `gate` at `index`, which must already be covered by the
    /// array and currently inactive.
    pub(crate) fn install(&mut self, index: usize, gate: Gate) {
        debug_assert!(self.slots[index].is_none());
        self.slots[index] = Some(gate);
    }

    /// Removes and returns the gate at `index`, if any.
    pub(crate) fn take(&mut self, index: usize) -> Option<Gate> {
        self.slots.get_mut(index)?.take()
    }

    /// Iterates indices of all active slots.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.is_some().then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_capacity_doubles_and_caps() {
        let mut arr: GateArray = GateArray::new(10);
        assert!(arr.ensure_capacity(0));
        assert_eq!(arr.curr_size(), 1);
        assert!(arr.ensure_capacity(3));
        assert!(arr.curr_size() >= 4);
        assert!(!arr.ensure_capacity(10)); // index 10 == max_gates, out of range
    }

    #[test]
    fn ensure_capacity_at_cap_boundary_succeeds() {
        let mut arr: GateArray = GateArray::new(10);
        assert!(arr.ensure_capacity(9));
        assert!(arr.curr_size() <= 10);
    }
}
