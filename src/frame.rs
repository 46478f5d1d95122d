//! Frame records for the shadow stack.

use pyo3::gc::{PyTraverseError, PyVisit};
use pyo3::intern;
use pyo3::prelude::*;

use crate::ids::FrameId;

/// One call-site record: location, method, and captured binding.
///
/// Immutable once pushed; only `prev` differs between a node's lifetimes in
/// the arena. `path` and `method_id` stay host string handles so that a push
/// is a refcount bump, never a string copy.
#[derive(Debug)]
pub struct Frame {
    pub path: Py<PyAny>,
    pub lineno: u32,
    pub method_id: Py<PyAny>,
    pub binding: Py<PyAny>,
    /// Link toward the caller's frame; `None` at the stack's bottom.
    pub prev: Option<FrameId>,
}

/// Fields extracted from one trace event, ready to enter the stack.
#[derive(Debug)]
pub struct CallRecord {
    pub path: Py<PyAny>,
    pub lineno: u32,
    pub method_id: Py<PyAny>,
    pub binding: Py<PyAny>,
}

impl CallRecord {
    /// Extract a record from a Python frame object.
    ///
    /// The frame itself is kept as the binding handle. `f_lineno` can be
    /// `None` on frames being torn down; that and any out-of-range value
    /// map to the 0 sentinel.
    pub fn from_frame(frame: &Bound<'_, PyAny>) -> PyResult<Self> {
        let py = frame.py();
        let code = frame.getattr(intern!(py, "f_code"))?;
        let lineno = frame
            .getattr(intern!(py, "f_lineno"))?
            .extract::<Option<u32>>()
            .unwrap_or(None)
            .unwrap_or(0);
        Ok(CallRecord {
            path: code.getattr(intern!(py, "co_filename"))?.unbind(),
            lineno,
            method_id: code.getattr(intern!(py, "co_name"))?.unbind(),
            binding: frame.clone().unbind(),
        })
    }

    pub(crate) fn into_frame(self, prev: Option<FrameId>) -> Frame {
        Frame {
            path: self.path,
            lineno: self.lineno,
            method_id: self.method_id,
            binding: self.binding,
            prev,
        }
    }
}

/// Read-only view of one shadow-stack frame.
///
/// `StackState.frames()` hands these out innermost-first. Fields are
/// `Option` only so `__clear__` can drop them; a view observed by user code
/// always has them populated.
#[pyclass]
pub struct TraceFrame {
    #[pyo3(get)]
    pub(crate) path: Option<Py<PyAny>>,
    #[pyo3(get)]
    pub(crate) lineno: u32,
    #[pyo3(get)]
    pub(crate) method_id: Option<Py<PyAny>>,
    #[pyo3(get)]
    pub(crate) binding: Option<Py<PyAny>>,
}

impl TraceFrame {
    pub(crate) fn from_node(py: Python<'_>, node: &Frame) -> Self {
        TraceFrame {
            path: Some(node.path.clone_ref(py)),
            lineno: node.lineno,
            method_id: Some(node.method_id.clone_ref(py)),
            binding: Some(node.binding.clone_ref(py)),
        }
    }
}

#[pymethods]
impl TraceFrame {
    fn __repr__(&self, py: Python<'_>) -> String {
        let display = |obj: &Option<Py<PyAny>>| {
            obj.as_ref()
                .map(|obj| {
                    obj.bind(py)
                        .str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| "<unprintable>".to_string())
                })
                .unwrap_or_else(|| "<cleared>".to_string())
        };
        format!(
            "<TraceFrame {}:{} in {}>",
            display(&self.path),
            self.lineno,
            display(&self.method_id)
        )
    }

    fn __traverse__(&self, visit: PyVisit<'_>) -> Result<(), PyTraverseError> {
        if let Some(path) = &self.path {
            visit.call(path)?;
        }
        if let Some(method_id) = &self.method_id {
            visit.call(method_id)?;
        }
        if let Some(binding) = &self.binding {
            visit.call(binding)?;
        }
        Ok(())
    }

    fn __clear__(&mut self) {
        self.path = None;
        self.method_id = None;
        self.binding = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_record_from_real_frame() {
        Python::attach(|py| {
            let frame = py
                .eval(c"__import__('sys')._getframe()", None, None)
                .unwrap();
            let record = CallRecord::from_frame(&frame).unwrap();

            let path: String = record.path.bind(py).extract().unwrap();
            let method: String = record.method_id.bind(py).extract().unwrap();
            assert_eq!(path, "<string>");
            assert_eq!(method, "<module>");
            assert!(record.binding.bind(py).is(&frame));
        });
    }

    #[test]
    fn test_call_record_rejects_non_frame() {
        Python::attach(|py| {
            let not_a_frame = py.eval(c"object()", None, None).unwrap();
            assert!(CallRecord::from_frame(&not_a_frame).is_err());
        });
    }

    #[test]
    fn test_trace_frame_repr() {
        Python::attach(|py| {
            let frame = Frame {
                path: pyo3::types::PyString::new(py, "lib/app.py")
                    .into_any()
                    .unbind(),
                lineno: 12,
                method_id: pyo3::types::PyString::new(py, "handler")
                    .into_any()
                    .unbind(),
                binding: py.None(),
                prev: None,
            };
            let view = TraceFrame::from_node(py, &frame);
            assert_eq!(view.__repr__(py), "<TraceFrame lib/app.py:12 in handler>");
        });
    }
}
