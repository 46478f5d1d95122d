//! Trace-event adapter and Python module surface.

use pyo3::gc::{PyTraverseError, PyVisit};
use pyo3::prelude::*;

use crate::frame::CallRecord;
use crate::registry::ThreadRegistry;
use crate::stack::StackState;

/// Reserved attribute under which a raised exception carries its stack
/// snapshot. Namespaced so user attributes are never shadowed.
pub const STACK_STATE_ATTR: &str = "__pytrace_stack_state__";

/// The tracing handle registered with the interpreter.
///
/// One callable dispatching call, return, and exception events onto the
/// per-thread shadow stacks it owns. Install it with `sys.settrace` (and
/// `threading.settrace` for threads started afterwards); enabling and
/// disabling is the caller's job, the handle never toggles tracing itself.
#[pyclass]
#[derive(Default)]
pub struct Tracepoint {
    registry: ThreadRegistry,
}

#[pymethods]
impl Tracepoint {
    #[new]
    fn py_new() -> Self {
        Tracepoint::default()
    }

    /// Trace-protocol entry point: `(frame, event, arg)`.
    ///
    /// `"call"` pushes, `"return"` pops, `"exception"` snapshots and
    /// attaches; every other event kind is ignored. Returns the tracepoint
    /// itself so the interpreter keeps delivering local events for the
    /// frame. Anomalies (unreadable frame, slotted exception) drop the
    /// event rather than raising into the host; only out-of-memory
    /// propagates.
    fn __call__(
        slf: &Bound<'_, Self>,
        frame: &Bound<'_, PyAny>,
        event: &str,
        arg: &Bound<'_, PyAny>,
    ) -> PyResult<Py<Tracepoint>> {
        let py = slf.py();
        let this = slf.borrow();
        match event {
            "call" => this.handle_call(py, frame)?,
            "return" => this.handle_return(py)?,
            "exception" => this.handle_raise(py, arg)?,
            _ => {}
        }
        Ok(slf.clone().unbind())
    }

    fn __traverse__(&self, visit: PyVisit<'_>) -> Result<(), PyTraverseError> {
        self.registry.traverse(&visit)
    }

    fn __clear__(&mut self) {
        self.registry.clear();
    }
}

impl Tracepoint {
    fn handle_call(&self, py: Python<'_>, frame: &Bound<'_, PyAny>) -> PyResult<()> {
        let Ok(record) = CallRecord::from_frame(frame) else {
            crate::trace_debug_log!("call event dropped: unreadable frame object");
            return Ok(());
        };
        let state = self.registry.get_or_create(py)?;
        state.bind(py).borrow_mut().push(record);
        Ok(())
    }

    fn handle_return(&self, py: Python<'_>) -> PyResult<()> {
        let state = self.registry.get_or_create(py)?;
        state.bind(py).borrow_mut().pop();
        Ok(())
    }

    /// Snapshot the live stack and park it on the raised exception.
    ///
    /// No state yet on this thread, or no exception value in the event, is
    /// a no-op. A snapshot from an earlier raise is overwritten.
    fn handle_raise(&self, py: Python<'_>, arg: &Bound<'_, PyAny>) -> PyResult<()> {
        let Some(state) = self.registry.get(py) else {
            return Ok(());
        };
        let Some(exc) = raised_exception(arg) else {
            return Ok(());
        };
        let snapshot = state.bind(py).borrow().snapshot(py);
        let snapshot = Py::new(py, snapshot)?;
        if exc.setattr(STACK_STATE_ATTR, snapshot).is_err() {
            crate::trace_debug_log!("exception snapshot dropped: setattr failed");
        }
        Ok(())
    }
}

/// The raised exception carried by an `"exception"` trace event, whose arg
/// is the `(type, value, traceback)` triple.
fn raised_exception<'py>(arg: &Bound<'py, PyAny>) -> Option<Bound<'py, PyAny>> {
    let exc = arg.get_item(1).ok()?;
    if exc.is_none() {
        None
    } else {
        Some(exc)
    }
}

/// Construct the single tracing handle wired to the internal callback.
#[pyfunction]
pub fn make_tracepoint() -> Tracepoint {
    Tracepoint::default()
}

/// Read the snapshot attached to a raised exception, if any.
#[pyfunction]
pub fn get_stack_state(exc: &Bound<'_, PyAny>) -> Option<Py<StackState>> {
    let state = exc.getattr(STACK_STATE_ATTR).ok()?;
    state.extract::<Py<StackState>>().ok()
}

#[pymodule]
pub fn pytrace(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Tracepoint>()?;
    m.add_class::<StackState>()?;
    m.add_class::<crate::frame::TraceFrame>()?;
    m.add("STACK_STATE_ATTR", STACK_STATE_ATTR)?;
    m.add_function(wrap_pyfunction!(make_tracepoint, m)?)?;
    m.add_function(wrap_pyfunction!(get_stack_state, m)?)?;
    Ok(())
}
