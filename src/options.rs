use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value as JsonValue};

use crate::{
    error::BoxError, Body, CancelToken, Headers, Method, Params, RequestError, RequestFields,
    Response, ResponseType, Timestamps, TransportFailure,
};

/// Builds the transport fields for one attempt from the merged options.
pub type SendTransform<T> = Arc<
    dyn Fn(&RequestOptions<T>) -> BoxFuture<'static, Result<RequestFields, BoxError>>
        + Send
        + Sync,
>;

/// Maps a successful transport result to the value a request resolves with.
pub type ResponseTransform<T> = Arc<
    dyn Fn(Response, &RequestOptions<T>) -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync,
>;

/// Decides, per failure, which fields the next attempt sends. `Err` stops retrying.
pub type RetryDecider = Arc<
    dyn Fn(RequestFields, TransportFailure) -> BoxFuture<'static, Result<RequestFields, BoxError>>
        + Send
        + Sync,
>;

/// Field names an extension key may not shadow.
const RESERVED_KEYS: &[&str] = &[
    "baseURL",
    "headers",
    "params",
    "retry",
    "timestamp",
    "disableOnline",
    "transformSend",
    "transformResponse",
    "cancelToken",
    "timeout",
    "responseType",
    "url",
    "method",
    "data",
];

/// What happens after a failed attempt.
#[derive(Clone)]
pub enum RetryPolicy {
    /// Up to `n` further attempts after the first failure.
    Count(u32),
    /// Caller-controlled retries.
    Decide(RetryDecider),
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => f.debug_tuple("Count").field(count).finish(),
            Self::Decide(_) => f.write_str("Decide(<fn>)"),
        }
    }
}

/// Shared slot receiving the send/response timestamps of the latest attempt.
#[derive(Clone, Debug, Default)]
pub struct TimestampSink(Arc<Mutex<Timestamps>>);

impl TimestampSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest recorded pair. `response` stays `None` while an attempt is in flight.
    pub fn get(&self) -> Timestamps {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, timestamps: Timestamps) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = timestamps;
    }
}

/// Whether and where per-attempt timestamps are recorded.
#[derive(Clone, Debug)]
pub enum TimestampPolicy {
    /// Attach timestamps to [`Response::timestamps`].
    Record,
    /// Attach them to the response and also write them into the sink.
    Sink(TimestampSink),
}

/// One configuration layer: the client default, or a per-call override.
///
/// Every field is optional; [`merge_config`](crate::merge_config) lays a
/// per-call layer over the default one.
pub struct RequestConfig<T = Response> {
    /// Prefix for relative URLs. Ignored for `http://` and `https://` URLs.
    pub base_url: Option<String>,
    pub headers: Option<Headers>,
    /// Values for `{key}` tokens in the URL.
    pub params: Option<Params>,
    pub retry: Option<RetryPolicy>,
    pub timestamp: Option<TimestampPolicy>,
    /// Send even when the connectivity gate reports offline or background.
    pub disable_online: Option<bool>,
    pub transform_send: Option<SendTransform<T>>,
    pub transform_response: Option<ResponseTransform<T>>,
    pub cancel_token: Option<CancelToken>,
    /// Per-attempt timeout in milliseconds; only values above zero apply.
    pub timeout_ms: Option<u64>,
    pub response_type: Option<ResponseType>,
    /// Caller-defined fields, merged per key and visible to transforms.
    pub extensions: Map<String, JsonValue>,
}

impl<T> Default for RequestConfig<T> {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: None,
            params: None,
            retry: None,
            timestamp: None,
            disable_online: None,
            transform_send: None,
            transform_response: None,
            cancel_token: None,
            timeout_ms: None,
            response_type: None,
            extensions: Map::new(),
        }
    }
}

impl<T> Clone for RequestConfig<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            params: self.params.clone(),
            retry: self.retry.clone(),
            timestamp: self.timestamp.clone(),
            disable_online: self.disable_online,
            transform_send: self.transform_send.clone(),
            transform_response: self.transform_response.clone(),
            cancel_token: self.cancel_token.clone(),
            timeout_ms: self.timeout_ms,
            response_type: self.response_type,
            extensions: self.extensions.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("retry", &self.retry)
            .field("timestamp", &self.timestamp)
            .field("disable_online", &self.disable_online)
            .field("transform_send", &self.transform_send.as_ref().map(|_| "<fn>"))
            .field(
                "transform_response",
                &self.transform_response.as_ref().map(|_| "<fn>"),
            )
            .field("cancel_token", &self.cancel_token)
            .field("timeout_ms", &self.timeout_ms)
            .field("response_type", &self.response_type)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl<T> RequestConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a default layer from the environment.
    ///
    /// Reads (all optional):
    /// - `MINI_REQUEST_BASE_URL`: base URL for relative paths
    /// - `MINI_REQUEST_RETRY`: fixed retry count
    /// - `MINI_REQUEST_TIMEOUT_MS`: per-attempt timeout
    ///
    /// Returns an error when a numeric variable does not parse.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("MINI_REQUEST_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = Some(base_url.trim().to_owned());
            }
        }
        if let Ok(retry) = std::env::var("MINI_REQUEST_RETRY") {
            let count = retry
                .trim()
                .parse::<u32>()
                .map_err(|err| format!("MINI_REQUEST_RETRY is not a retry count: {err}"))?;
            config.retry = Some(RetryPolicy::Count(count));
        }
        if let Ok(timeout) = std::env::var("MINI_REQUEST_TIMEOUT_MS") {
            let timeout_ms = timeout
                .trim()
                .parse::<u64>()
                .map_err(|err| format!("MINI_REQUEST_TIMEOUT_MS is not a number: {err}"))?;
            config.timeout_ms = Some(timeout_ms);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Retries failed attempts up to `retries` more times.
    pub fn with_retry(mut self, retries: u32) -> Self {
        self.retry = Some(RetryPolicy::Count(retries));
        self
    }

    /// Installs a retry decision function.
    pub fn with_retry_decider<F, Fut>(mut self, decide: F) -> Self
    where
        F: Fn(RequestFields, TransportFailure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RequestFields, BoxError>> + Send + 'static,
    {
        self.retry = Some(RetryPolicy::Decide(Arc::new(
            move |fields: RequestFields, reason: TransportFailure| decide(fields, reason).boxed(),
        )));
        self
    }

    pub fn with_timestamp(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp = Some(policy);
        self
    }

    pub fn with_disable_online(mut self, disable: bool) -> Self {
        self.disable_online = Some(disable);
        self
    }

    /// Installs the send-transform.
    ///
    /// The returned future must own its data; clone what it needs from the
    /// options before the `async` block.
    pub fn with_transform_send<F, Fut>(mut self, transform: F) -> Self
    where
        T: 'static,
        F: Fn(&RequestOptions<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RequestFields, BoxError>> + Send + 'static,
    {
        self.transform_send = Some(Arc::new(move |options: &RequestOptions<T>| {
            transform(options).boxed()
        }));
        self
    }

    /// Installs the response-transform.
    pub fn with_transform_response<F, Fut>(mut self, transform: F) -> Self
    where
        T: 'static,
        F: Fn(Response, &RequestOptions<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        self.transform_response = Some(Arc::new(
            move |response: Response, options: &RequestOptions<T>| {
                transform(response, options).boxed()
            },
        ));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Adds a caller-defined field; keys may not shadow named fields.
    pub fn with_extension(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Timeout that actually applies to an attempt.
    pub(crate) fn effective_timeout_ms(&self) -> Option<u64> {
        self.timeout_ms.filter(|timeout| *timeout > 0)
    }

    /// Rejects extension keys that are empty or shadow a named field.
    pub(crate) fn validate(&self) -> Result<(), RequestError> {
        for key in self.extensions.keys() {
            if key.is_empty() {
                return Err(RequestError::configuration("empty extension key"));
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(RequestError::configuration(format!(
                    "extension key '{key}' shadows a configuration field"
                )));
            }
        }
        Ok(())
    }
}

/// Full description of one logical request: descriptor plus configuration.
pub struct RequestOptions<T = Response> {
    /// Absolute URL or a path template relative to `base_url`.
    pub url: String,
    pub method: Method,
    pub data: Option<Body>,
    pub config: RequestConfig<T>,
}

impl<T> Clone for RequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method,
            data: self.data.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("data", &self.data)
            .field("config", &self.config)
            .finish()
    }
}

impl<T> RequestOptions<T> {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            data: None,
            config: RequestConfig::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn with_data(mut self, data: impl Into<Body>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_config(mut self, config: RequestConfig<T>) -> Self {
        self.config = config;
        self
    }
}
