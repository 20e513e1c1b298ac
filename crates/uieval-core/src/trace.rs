pub use uieval_types::{TokenUsage, Trace, TraceBuilder};

// Task-local storage for collecting traces while one scenario is evaluated
use std::cell::RefCell;

tokio::task_local! {
    static TRACES: RefCell<Vec<Trace>>;
}

/// Run a future within a tracing scope and return the result along with collected traces.
pub async fn scope_traces<F, R>(f: F) -> (R, Vec<Trace>)
where
    F: std::future::Future<Output = R>,
{
    let traces = RefCell::new(Vec::new());
    TRACES
        .scope(traces, async move {
            let result = f.await;
            let collected = TRACES.with(|t| t.borrow().clone());
            (result, collected)
        })
        .await
}

/// Report a trace. Outside of a `scope_traces` future this is a no-op.
pub fn report_trace(trace: Trace) {
    let _ = TRACES.try_with(|traces| {
        traces.borrow_mut().push(trace);
    });
}
