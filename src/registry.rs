//! Thread-to-stack-state registry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use pyo3::gc::{PyTraverseError, PyVisit};
use pyo3::prelude::*;

use crate::stack::StackState;

/// Maps thread identity to that thread's owned shadow stack.
///
/// Entries are created on the first event observed for a thread and live as
/// long as the registry. Event callbacks run on the thread that generated
/// the event, so each thread only ever touches its own entry and the lock
/// is uncontended apart from first-event insertion.
#[derive(Default)]
pub struct ThreadRegistry {
    states: Mutex<HashMap<ThreadId, Py<StackState>>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        ThreadRegistry {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// The calling thread's state, lazily constructing an empty one on
    /// first use.
    pub fn get_or_create(&self, py: Python<'_>) -> PyResult<Py<StackState>> {
        let key = thread::current().id();
        {
            let states = self.states.lock().expect("thread registry lock poisoned");
            if let Some(state) = states.get(&key) {
                return Ok(state.clone_ref(py));
            }
        }

        // Allocated outside the lock: the allocation can start a GC pass,
        // and GC traversal takes the lock.
        let fresh = Py::new(py, StackState::new())?;
        let mut states = self.states.lock().expect("thread registry lock poisoned");
        Ok(states.entry(key).or_insert(fresh).clone_ref(py))
    }

    /// The calling thread's state if one exists, without creating one.
    pub fn get(&self, py: Python<'_>) -> Option<Py<StackState>> {
        let key = thread::current().id();
        let states = self.states.lock().expect("thread registry lock poisoned");
        states.get(&key).map(|state| state.clone_ref(py))
    }

    /// Report every stored state to the host garbage collector.
    pub fn traverse(&self, visit: &PyVisit<'_>) -> Result<(), PyTraverseError> {
        let states = self.states.lock().expect("thread registry lock poisoned");
        for state in states.values() {
            visit.call(state.as_any())?;
        }
        Ok(())
    }

    pub fn clear(&self) {
        // Dropped outside the lock: state teardown can run Python code,
        // which can start a GC pass, and GC traversal takes the lock.
        let states = std::mem::take(
            &mut *self.states.lock().expect("thread registry lock poisoned"),
        );
        drop(states);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.states
            .lock()
            .expect("thread registry lock poisoned")
            .len()
    }
}
