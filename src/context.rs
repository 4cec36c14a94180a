//! Per-run context handed explicitly to the orchestrator

use crate::utils::clock::{Clock, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

#[derive(Clone)]
pub struct RunContext {
    /// Parent span for all per-target spans of the run
    pub span: Span,
    pub clock: Arc<dyn Clock>,
    /// Parent of every target's scratch directory
    pub temp_dir: PathBuf,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(temp_dir: PathBuf) -> Self {
        Self {
            span: Span::current(),
            clock: Arc::new(SystemClock),
            temp_dir,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("temp_dir", &self.temp_dir)
            .field("now", &self.clock.now())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
