//! Per-request state machine.
//!
//! ```text
//! configuring -> transforming -> gated -> dispatched -> succeeded -> resolved
//!                     ^                        |
//!                     +------ retrying <---- failed -> rejected
//! ```
//!
//! Cancellation is checked at every suspension boundary and is terminal.
//! Exactly one attempt is outstanding per logical request.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{
    CancelToken, ConnectivityGate, RequestError, RequestFields, RequestOptions, Response, Result,
    RetryDecider, RetryPolicy, TaskHandle, TimestampPolicy, Timestamps, Transport,
    TransportFailure,
};

/// Drives one logical request whose configuration is already merged.
pub(crate) async fn run<T>(
    transport: &dyn Transport,
    gate: Option<&ConnectivityGate>,
    options: RequestOptions<T>,
) -> Result<T>
where
    T: From<Response>,
{
    let config = &options.config;
    let token = config.cancel_token.as_ref();
    let transform_send = config
        .transform_send
        .clone()
        .ok_or_else(|| RequestError::configuration("no send transform configured"))?;
    let mut retry = RetryState::new(config.retry.as_ref());
    let mut prepared: Option<RequestFields> = None;

    loop {
        ensure_not_cancelled(token)?;
        let fields = match prepared.take() {
            Some(fields) => fields,
            None => {
                let transformed = async {
                    transform_send(&options)
                        .await
                        .map_err(RequestError::Configuration)
                };
                unless_cancelled(token, transformed).await?
            }
        };

        if !config.disable_online.unwrap_or(false) {
            if let Some(gate) = gate {
                wait_for_gate(gate, token).await?;
            }
        }
        ensure_not_cancelled(token)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("dispatching {} {}", fields.method.as_str(), fields.url);

        let pending = PendingAttempt {
            handle: transport.issue(fields.clone()),
            started_at: now_ms(),
            token: token.cloned(),
        };
        let started_at = pending.started_at;
        record_send(config.timestamp.as_ref(), started_at);
        let outcome = pending.settle(config.effective_timeout_ms()).await;
        let timestamps = record_timestamps(config.timestamp.as_ref(), started_at);

        match outcome {
            Ok(mut response) => {
                response.timestamps = timestamps;
                return match &config.transform_response {
                    Some(transform) => transform(response, &options)
                        .await
                        .map_err(RequestError::Configuration),
                    None => Ok(T::from(response)),
                };
            }
            Err(failure) => {
                // Cancellation wins over whatever the aborted attempt reported.
                ensure_not_cancelled(token)?;
                match unless_cancelled(token, retry.after_failure(fields, failure)).await? {
                    Next::Transform => {}
                    Next::Send(fields) => prepared = Some(fields),
                    Next::GiveUp(failure) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("retries exhausted: {}", failure);
                        return Err(RequestError::Transport(failure));
                    }
                }
                #[cfg(feature = "tracing")]
                tracing::debug!("retrying {}", options.url);
            }
        }
    }
}

/// What follows a failed attempt.
#[derive(Debug)]
enum Next {
    /// Re-run the send-transform from the original options.
    Transform,
    /// Dispatch these fields as they are.
    Send(RequestFields),
    GiveUp(TransportFailure),
}

enum RetryState {
    Never,
    Count { remaining: u32 },
    Decide(RetryDecider),
}

impl RetryState {
    fn new(policy: Option<&RetryPolicy>) -> Self {
        match policy {
            None => Self::Never,
            Some(RetryPolicy::Count(count)) => Self::Count { remaining: *count },
            Some(RetryPolicy::Decide(decide)) => Self::Decide(Arc::clone(decide)),
        }
    }

    async fn after_failure(
        &mut self,
        fields: RequestFields,
        failure: TransportFailure,
    ) -> Result<Next> {
        match self {
            Self::Never => Ok(Next::GiveUp(failure)),
            Self::Count { remaining } if *remaining > 0 => {
                *remaining -= 1;
                Ok(Next::Transform)
            }
            Self::Count { .. } => Ok(Next::GiveUp(failure)),
            Self::Decide(decide) => {
                let decide = Arc::clone(decide);
                decide(fields, failure)
                    .await
                    .map(Next::Send)
                    .map_err(RequestError::RetryDecision)
            }
        }
    }
}

/// The one outstanding dispatch of a logical request.
struct PendingAttempt {
    handle: TaskHandle,
    started_at: u64,
    token: Option<CancelToken>,
}

impl PendingAttempt {
    /// Waits for completion, aborting once on cancellation or timeout.
    async fn settle(self, timeout_ms: Option<u64>) -> std::result::Result<Response, TransportFailure> {
        let PendingAttempt {
            mut handle, token, ..
        } = self;

        tokio::select! {
            biased;
            _ = cancelled(token.as_ref()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("aborting in-flight attempt: request cancelled");
                handle.abort();
                Err(TransportFailure::aborted())
            }
            outcome = &mut handle => outcome,
            _ = deadline(timeout_ms) => {
                let timeout_ms = timeout_ms.unwrap_or_default();
                #[cfg(feature = "tracing")]
                tracing::debug!("aborting in-flight attempt after {} ms", timeout_ms);
                handle.abort();
                Err(TransportFailure::timed_out(timeout_ms))
            }
        }
    }
}

async fn wait_for_gate(gate: &ConnectivityGate, token: Option<&CancelToken>) -> Result<()> {
    if gate.is_ready() {
        return Ok(());
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("connectivity gate closed, holding dispatch: {:?}", gate.state());

    tokio::select! {
        biased;
        _ = cancelled(token) => ensure_not_cancelled(token),
        _ = gate.ready() => Ok(()),
    }
}

/// Awaits `work` unless the token fires first.
///
/// An error that arrives once the token is cancelled is reported as the
/// cancellation.
async fn unless_cancelled<V, F>(token: Option<&CancelToken>, work: F) -> Result<V>
where
    F: Future<Output = Result<V>>,
{
    let outcome = tokio::select! {
        biased;
        _ = cancelled(token) => None,
        outcome = work => Some(outcome),
    };
    match outcome {
        Some(Ok(value)) => Ok(value),
        Some(Err(err)) => {
            ensure_not_cancelled(token)?;
            Err(err)
        }
        None => Err(cancellation(token)),
    }
}

fn cancellation(token: Option<&CancelToken>) -> RequestError {
    RequestError::Cancelled {
        reason: token.and_then(CancelToken::reason),
    }
}

fn ensure_not_cancelled(token: Option<&CancelToken>) -> Result<()> {
    token.map_or(Ok(()), CancelToken::throw_if_cancelled)
}

async fn cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn deadline(timeout_ms: Option<u64>) {
    match timeout_ms {
        Some(timeout_ms) => tokio::time::sleep(Duration::from_millis(timeout_ms)).await,
        None => std::future::pending().await,
    }
}

/// Publishes the send time to a sink while the attempt is in flight.
fn record_send(policy: Option<&TimestampPolicy>, started_at: u64) {
    if let Some(TimestampPolicy::Sink(sink)) = policy {
        sink.set(Timestamps {
            send: Some(started_at),
            response: None,
        });
    }
}

fn record_timestamps(policy: Option<&TimestampPolicy>, started_at: u64) -> Option<Timestamps> {
    let policy = policy?;
    let timestamps = Timestamps {
        send: Some(started_at),
        response: Some(now_ms()),
    };
    if let TimestampPolicy::Sink(sink) = policy {
        sink.set(timestamps);
    }
    Some(timestamps)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{Next, RetryState};
    use crate::{RequestFields, RetryPolicy, TransportFailure};

    #[tokio::test]
    async fn count_policy_allows_exactly_n_retries() {
        let mut retry = RetryState::new(Some(&RetryPolicy::Count(2)));
        for _ in 0..2 {
            let next = retry
                .after_failure(RequestFields::default(), TransportFailure::new("boom"))
                .await
                .expect("count policy never errors");
            assert!(matches!(next, Next::Transform));
        }
        let next = retry
            .after_failure(RequestFields::default(), TransportFailure::new("last"))
            .await
            .expect("count policy never errors");
        match next {
            Next::GiveUp(failure) => assert_eq!(failure.message, "last"),
            other => panic!("expected give-up, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_policy_gives_up_immediately() {
        let mut retry = RetryState::new(None);
        let next = retry
            .after_failure(RequestFields::default(), TransportFailure::new("boom"))
            .await
            .expect("no policy never errors");
        assert!(matches!(next, Next::GiveUp(_)));
    }
}
