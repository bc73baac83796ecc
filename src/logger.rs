//! User-facing log sink for push failures.
//!
//! A bridge without a logger stays silent. Internal diagnostics still go
//! through `tracing` at debug level regardless.

/// Free-form logging sink.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Forwards messages to `tracing` at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::warn!(target: "graphite_bridge", "{message}");
    }
}
