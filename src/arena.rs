//! Frame arena with free list for pooled allocation.

use crate::frame::Frame;
use crate::ids::FrameId;

/// Slab of frame nodes plus a free list of retired slots.
///
/// `alloc` reuses a retired slot before growing the slab, so a warm
/// push/pop cycle performs no heap allocation. Retired slots keep their
/// stale contents until `alloc` repopulates them; a retired id must never
/// be dereferenced in between.
pub struct FrameArena {
    frames: Vec<Frame>,
    free_list: Vec<FrameId>,
}

impl FrameArena {
    pub fn new() -> Self {
        FrameArena {
            frames: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn alloc(&mut self, frame: Frame) -> FrameId {
        if let Some(id) = self.free_list.pop() {
            self.frames[id.index()] = frame;
            id
        } else {
            let id = FrameId::from_index(self.frames.len());
            self.frames.push(frame);
            id
        }
    }

    /// Move a node to the free list. Its slot is left as-is and is only
    /// rewritten by the next `alloc` that reuses it.
    pub fn retire(&mut self, id: FrameId) {
        debug_assert!(id.index() < self.frames.len());
        self.free_list.push(id);
    }

    /// Borrow a live node. Must not be called with a retired id.
    pub fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id.index()]
    }

    /// Number of live (non-retired) nodes.
    pub fn len(&self) -> usize {
        self.frames.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots ever allocated, live or pooled.
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}
