//! Per-thread shadow stack state.

use pyo3::gc::{PyTraverseError, PyVisit};
use pyo3::prelude::*;

use crate::arena::FrameArena;
use crate::frame::{CallRecord, Frame, TraceFrame};
use crate::ids::FrameId;

/// The live shadow call stack for one thread.
///
/// `top` heads a singly-linked chain through the arena that mirrors the
/// thread's call nesting between events. Retired nodes stay pooled in the
/// arena's free list, so a warm push/pop cycle allocates nothing.
///
/// Exception snapshots are themselves `StackState` objects with an empty
/// pool, produced by [`StackState::snapshot`].
#[pyclass]
#[derive(Default)]
pub struct StackState {
    arena: FrameArena,
    top: Option<FrameId>,
}

impl StackState {
    pub fn new() -> Self {
        StackState {
            arena: FrameArena::new(),
            top: None,
        }
    }

    /// Push one call record, reusing a pooled node when one is available.
    pub fn push(&mut self, record: CallRecord) {
        let prev = self.top;
        let id = self.arena.alloc(record.into_frame(prev));
        self.top = Some(id);
    }

    /// Pop the newest frame into the pool.
    ///
    /// Popping an empty stack is a silent no-op: a lost call event must not
    /// crash the host's event delivery or corrupt the chain.
    pub fn pop(&mut self) {
        if let Some(id) = self.top {
            self.top = self.arena.get(id).prev;
            self.arena.retire(id);
        }
    }

    /// Number of live frames.
    pub fn depth(&self) -> usize {
        self.arena.len()
    }

    /// Walk the live chain innermost-first. Restartable and read-only.
    pub fn iter(&self) -> FrameIter<'_> {
        FrameIter {
            arena: &self.arena,
            next: self.top,
        }
    }

    /// Duplicate the live chain into a fresh state: same order, same field
    /// values, newly allocated nodes, empty pool. Afterwards neither side
    /// can observe mutation of the other.
    pub fn snapshot(&self, py: Python<'_>) -> StackState {
        let mut ids = Vec::with_capacity(self.depth());
        let mut next = self.top;
        while let Some(id) = next {
            ids.push(id);
            next = self.arena.get(id).prev;
        }

        let mut copy = StackState::new();
        for id in ids.into_iter().rev() {
            let node = self.arena.get(id);
            copy.push(CallRecord {
                path: node.path.clone_ref(py),
                lineno: node.lineno,
                method_id: node.method_id.clone_ref(py),
                binding: node.binding.clone_ref(py),
            });
        }
        copy
    }
}

#[pymethods]
impl StackState {
    #[new]
    fn py_new() -> Self {
        StackState::new()
    }

    /// Frame views innermost-first, one per live node.
    fn frames(&self, py: Python<'_>) -> Vec<TraceFrame> {
        self.iter()
            .map(|node| TraceFrame::from_node(py, node))
            .collect()
    }

    fn __len__(&self) -> usize {
        self.depth()
    }

    fn __copy__(&self, py: Python<'_>) -> StackState {
        self.snapshot(py)
    }

    fn __traverse__(&self, visit: PyVisit<'_>) -> Result<(), PyTraverseError> {
        // Only the live chain is reported: pooled slots hold stale handles
        // by contract and must not be treated as reachable structure.
        for node in self.iter() {
            visit.call(&node.path)?;
            visit.call(&node.method_id)?;
            visit.call(&node.binding)?;
        }
        Ok(())
    }

    fn __clear__(&mut self) {
        self.top = None;
        self.arena = FrameArena::new();
    }
}

/// Lazy innermost-first walk over a state's live frames.
pub struct FrameIter<'a> {
    arena: &'a FrameArena,
    next: Option<FrameId>,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.arena.get(id);
        self.next = node.prev;
        Some(node)
    }
}
