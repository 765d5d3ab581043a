//! The active span of the running task.
//!
//! The binding is a tokio task-local scope: it follows a future across
//! `.await` points and is invisible to other tasks. Spawned tasks do not
//! inherit it; wrap them with [`with_span`] to carry it over.

use std::future::Future;

use crate::tracer::SpanHandle;

tokio::task_local! {
    static ACTIVE: SpanHandle;
}

/// Span bound to the running task, if any.
pub fn current_span() -> Option<SpanHandle> {
    ACTIVE.try_with(Clone::clone).ok()
}

/// Run `fut` with `span` bound as the current span.
pub async fn with_span<F: Future>(span: SpanHandle, fut: F) -> F::Output {
    ACTIVE.scope(span, fut).await
}

/// Finish `span`. A second call is reported and otherwise ignored.
pub fn close_span(span: &SpanHandle) -> bool {
    let finished = span.finish();
    if !finished {
        tracing::warn!(
            span_id = %format_args!("{:x}", span.context().span_id),
            "Span already finished"
        );
    }
    finished
}

/// Owns finish-responsibility for a span.
///
/// Dropping an unclosed guard means the work it covered was cancelled; the
/// span is then finished with `cancelled=true`.
#[derive(Debug)]
pub struct SpanGuard {
    span: SpanHandle,
    closed: bool,
}

impl SpanGuard {
    pub fn new(span: SpanHandle) -> Self {
        Self { span, closed: false }
    }

    pub fn span(&self) -> &SpanHandle {
        &self.span
    }

    pub fn close(mut self) -> bool {
        self.closed = true;
        close_span(&self.span)
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::debug!(
            span_id = %format_args!("{:x}", self.span.context().span_id),
            "Span dropped before close, finishing as cancelled"
        );
        self.span.set_tag("cancelled", true);
        close_span(&self.span);
    }
}
