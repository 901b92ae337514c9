//! Explicit runtime context handed to an engine at construction.
//!
//! Holds the tracing span the engine logs under and the shutdown flag an
//! outside watchdog (signal handler, supervisor thread) can raise. Nothing
//! here is global; two engines in one process get two contexts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared quit request. Raised by a third party, polled by the engine at
/// cycle boundaries.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every engine sharing this flag to quit.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether quit was requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Logging and shutdown wiring for one engine.
#[derive(Debug, Clone)]
pub struct EngineContext {
    span: tracing::Span,
    shutdown: ShutdownFlag,
}

impl EngineContext {
    /// Creates a context whose log records carry `name`.
    pub fn new(name: &str) -> Self {
        Self {
            span: tracing::info_span!("engine", name = %name),
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Uses an existing shutdown flag, e.g. one wired to Ctrl-C.
    pub fn with_shutdown(mut self, shutdown: ShutdownFlag) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Span the engine enters while running.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// The shutdown flag.
    pub fn shutdown(&self) -> &ShutdownFlag {
        &self.shutdown
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new("rivulet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let ctx = EngineContext::new("t").with_shutdown(flag.clone());
        assert!(!ctx.shutdown().is_requested());
        flag.request();
        assert!(ctx.shutdown().is_requested());
    }
}
