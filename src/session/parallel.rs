//! Parallel-Flow Combinator
//!
//! Runs one future per session on the calling task with `join_all`. Flows
//! interleave only at their own await points, and each carries its own
//! task-local session binding. Every flow runs to completion; errors are
//! reported after all flows have settled, never by cancelling siblings.
//! A panicking flow (a failed `assert!` in a test body) is caught, the other
//! flows still finish, and the first panic in submission order is then
//! resumed on the caller.

use super::registry::{SessionName, SessionRegistry};
use super::report::{FlowOutcome, FlowStatus, ParallelReport};
use super::tracker;
use crate::error::SessionError;
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// One settled flow
#[derive(Debug)]
pub struct Settled<T, E> {
    pub session: SessionName,
    pub duration: Duration,
    pub result: Result<T, E>,
}

/// Run every flow to completion and return each result in submission order.
///
/// If any flow panics, the panic is resumed once all flows have settled.
pub async fn parallel_settled<I, S, F, T, E>(
    registry: &SessionRegistry,
    flows: I,
) -> Vec<Settled<T, E>>
where
    I: IntoIterator<Item = (S, F)>,
    S: Into<SessionName>,
    F: Future<Output = Result<T, E>>,
    E: From<SessionError>,
{
    let tasks = flows.into_iter().map(|(name, body)| {
        let session: SessionName = name.into();
        async move {
            let start = Instant::now();
            let outcome = AssertUnwindSafe(tracker::run_as(registry, session.as_str(), body))
                .catch_unwind()
                .await;
            let duration = start.elapsed();
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    log::error!("[{}] flow panicked after {:?}", session, duration);
                    return Err(payload);
                }
            };
            match &result {
                Ok(_) => log::debug!("[{}] flow passed in {:?}", session, duration),
                Err(_) => log::warn!("[{}] flow failed after {:?}", session, duration),
            }
            Ok(Settled {
                session,
                duration,
                result,
            })
        }
    });

    let mut settled = Vec::new();
    let mut first_panic = None;
    for outcome in join_all(tasks).await {
        match outcome {
            Ok(flow) => settled.push(flow),
            Err(payload) => {
                first_panic.get_or_insert(payload);
            }
        }
    }

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
    settled
}

/// Run every flow to completion, then fail with the first error in
/// submission order or return all outputs in submission order
pub async fn parallel<I, S, F, T, E>(registry: &SessionRegistry, flows: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = (S, F)>,
    S: Into<SessionName>,
    F: Future<Output = Result<T, E>>,
    E: From<SessionError>,
{
    parallel_settled(registry, flows)
        .await
        .into_iter()
        .map(|settled| settled.result)
        .collect()
}

/// Like `parallel`, but summarise every flow in a `ParallelReport`
pub async fn parallel_report<I, S, F, T, E>(registry: &SessionRegistry, flows: I) -> ParallelReport
where
    I: IntoIterator<Item = (S, F)>,
    S: Into<SessionName>,
    F: Future<Output = Result<T, E>>,
    T: Serialize,
    E: From<SessionError> + std::fmt::Display,
{
    let start = Instant::now();
    let settled = parallel_settled(registry, flows).await;

    let mut report = ParallelReport::new(settled.len());
    report.wall_duration = start.elapsed();

    for (i, flow) in settled.into_iter().enumerate() {
        let (status, output, error) = match flow.result {
            Ok(value) => (FlowStatus::Passed, serde_json::to_value(value).ok(), None),
            Err(e) => (FlowStatus::Failed, None, Some(e.to_string())),
        };
        report.add_outcome(FlowOutcome {
            step: i + 1,
            session: flow.session,
            status,
            duration: flow.duration,
            output,
            error,
        });
    }

    report
}
