//! The host request primitive the orchestrator drives.
//!
//! A [`Transport`] turns [`RequestFields`] into a [`TaskHandle`]: a future of
//! the attempt's outcome that can be aborted while outstanding. Any
//! `Fn(RequestFields) -> TaskHandle` closure is a transport; on native
//! targets [`ReqwestTransport`] adapts a `reqwest::Client`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};

use crate::{RequestFields, Response, TransportFailure};

/// Issues one dispatch attempt.
pub trait Transport: Send + Sync {
    fn issue(&self, fields: RequestFields) -> TaskHandle;
}

impl<F> Transport for F
where
    F: Fn(RequestFields) -> TaskHandle + Send + Sync,
{
    fn issue(&self, fields: RequestFields) -> TaskHandle {
        self(fields)
    }
}

/// Live handle to one outstanding attempt.
///
/// Resolves with the attempt's outcome. [`TaskHandle::abort`] runs the abort
/// hook at most once.
pub struct TaskHandle {
    completion: BoxFuture<'static, Result<Response, TransportFailure>>,
    abort: Option<Box<dyn FnOnce() + Send>>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

impl TaskHandle {
    /// Wraps a completion future and the hook that aborts it.
    pub fn new<Fut, A>(completion: Fut, abort: A) -> Self
    where
        Fut: Future<Output = Result<Response, TransportFailure>> + Send + 'static,
        A: FnOnce() + Send + 'static,
    {
        Self {
            completion: completion.boxed(),
            abort: Some(Box::new(abort)),
        }
    }

    /// Handle whose outcome is already known; aborting it does nothing.
    pub fn ready(outcome: Result<Response, TransportFailure>) -> Self {
        Self::new(futures::future::ready(outcome), || {})
    }

    /// Runs `completion` on the tokio runtime; aborting cancels the task.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn<Fut>(completion: Fut) -> Self
    where
        Fut: Future<Output = Result<Response, TransportFailure>> + Send + 'static,
    {
        let task = tokio::spawn(completion);
        let abort_handle = task.abort_handle();
        let completion = task.map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => Err(TransportFailure::aborted()),
            Err(err) => Err(TransportFailure::new(format!("request:fail {err}"))),
        });
        Self::new(completion, move || abort_handle.abort())
    }

    /// Runs the abort hook. Later calls do nothing.
    pub fn abort(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }

    /// Whether [`TaskHandle::abort`] has been called.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_none()
    }
}

impl Future for TaskHandle {
    type Output = Result<Response, TransportFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.completion.as_mut().poll(cx)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::ReqwestTransport;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::collections::BTreeMap;

    use serde_json::Value as JsonValue;

    use super::{TaskHandle, Transport};
    use crate::{Body, RequestFields, Response, ResponseType, TransportFailure};

    /// Host primitive backed by a `reqwest::Client`.
    ///
    /// Each attempt runs in its own tokio task so it can be aborted.
    /// Non-2xx statuses are successful completions; only transport-level
    /// errors are failures.
    #[derive(Clone, Debug, Default)]
    pub struct ReqwestTransport {
        http: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_client(http: reqwest::Client) -> Self {
            Self { http }
        }
    }

    impl Transport for ReqwestTransport {
        fn issue(&self, fields: RequestFields) -> TaskHandle {
            TaskHandle::spawn(send(self.http.clone(), fields))
        }
    }

    async fn send(
        http: reqwest::Client,
        fields: RequestFields,
    ) -> Result<Response, TransportFailure> {
        let method = reqwest::Method::from_bytes(fields.method.as_str().as_bytes())
            .map_err(|err| TransportFailure::new(format!("request:fail {err}")))?;
        let mut request = http.request(method, &fields.url);
        for (name, value) in &fields.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request = match fields.data {
            None => request,
            Some(Body::Json(JsonValue::Object(map))) if fields.method.sends_query() => {
                request.query(&query_pairs(&map))
            }
            Some(Body::Json(value)) => request.json(&value),
            Some(Body::Text(text)) => request.body(text),
            Some(Body::Binary(bytes)) => request.body(bytes),
        };

        let response = request.send().await.map_err(failure)?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();

        let body = match fields.response_type {
            ResponseType::ArrayBuffer => {
                Body::Binary(response.bytes().await.map_err(failure)?.to_vec())
            }
            ResponseType::Text => Body::Text(response.text().await.map_err(failure)?),
            ResponseType::Json => {
                let text = response.text().await.map_err(failure)?;
                // Bodies that are not JSON come back as text, like the host does.
                match serde_json::from_str::<JsonValue>(&text) {
                    Ok(value) => Body::Json(value),
                    Err(_) => Body::Text(text),
                }
            }
        };

        Ok(Response {
            status,
            headers,
            body,
            timestamps: None,
        })
    }

    fn query_pairs(map: &serde_json::Map<String, JsonValue>) -> Vec<(String, String)> {
        map.iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let value = match value {
                    JsonValue::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn failure(err: reqwest::Error) -> TransportFailure {
        TransportFailure {
            message: format!("request:fail {err}"),
            timeout: err.is_timeout(),
        }
    }

    #[cfg(test)]
    mod tests {
        use serde_json::json;

        use super::query_pairs;

        #[test]
        fn query_pairs_skip_nulls_and_unquote_strings() {
            let value = json!({"a": "x", "b": 2, "c": null});
            let map = value.as_object().expect("fixture is an object");
            assert_eq!(
                query_pairs(map),
                vec![
                    ("a".to_owned(), "x".to_owned()),
                    ("b".to_owned(), "2".to_owned())
                ]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{TaskHandle, Transport};
    use crate::{RequestFields, Response};

    #[test]
    fn abort_hook_runs_once() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&aborts);
        let mut handle = TaskHandle::new(futures::future::pending(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.abort();
        handle.abort();

        assert!(handle.is_aborted());
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closures_are_transports() {
        let transport = |fields: RequestFields| {
            TaskHandle::ready(Ok(Response::new(200, fields.url)))
        };
        let response = transport
            .issue(RequestFields {
                url: "/echo".to_owned(),
                ..Default::default()
            })
            .await
            .expect("ready handle must succeed");
        assert_eq!(response.body.as_text(), Some("/echo"));
    }

    #[tokio::test]
    async fn spawned_handle_reports_abort_as_failure() {
        let mut handle = TaskHandle::spawn(futures::future::pending());
        handle.abort();
        let failure = handle.await.expect_err("aborted task must fail");
        assert_eq!(failure.message, "request:fail abort");
    }
}
