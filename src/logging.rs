//! Compile-time gated debug logging for the tracer.

/// Emit tracer debug logs only when the `trace_debug_logs` Cargo feature is
/// enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments.
#[macro_export]
macro_rules! trace_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "trace_debug_logs")]
        {
            eprintln!($($arg)*);
        }
        #[cfg(not(feature = "trace_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
