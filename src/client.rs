use std::fmt;
use std::sync::Arc;

use crate::{
    lifecycle, merge_config, transform::default_send_transform, Body, ConnectivityGate, Method,
    RequestConfig, RequestOptions, Response, Result, Scalar, Transport,
};

/// Header used to tunnel verbs the host primitive cannot send.
const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Request client: a default configuration layer, a transport and an
/// optional connectivity gate.
///
/// `T` is what requests resolve with: the response-transform's output, or
/// `T::from(Response)` when no transform is configured.
pub struct Http<T = Response> {
    transport: Arc<dyn Transport>,
    defaults: Arc<RequestConfig<T>>,
    gate: Option<ConnectivityGate>,
}

impl<T> Clone for Http<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            defaults: Arc::clone(&self.defaults),
            gate: self.gate.clone(),
        }
    }
}

impl<T> fmt::Debug for Http<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http")
            .field("transport", &"<transport>")
            .field("defaults", &self.defaults)
            .field("gate", &self.gate)
            .finish()
    }
}

impl<T> Http<T>
where
    T: From<Response> + 'static,
{
    /// Creates a client over `transport` with `defaults` as the default layer.
    ///
    /// When `defaults` has no send-transform,
    /// [`transform_send_default`](crate::transform_send_default) is installed.
    pub fn new(transport: impl Transport + 'static, mut defaults: RequestConfig<T>) -> Self {
        if defaults.transform_send.is_none() {
            defaults.transform_send = Some(default_send_transform());
        }
        Self {
            transport: Arc::new(transport),
            defaults: Arc::new(defaults),
            gate: None,
        }
    }

    /// Creates a client backed by a fresh [`ReqwestTransport`](crate::ReqwestTransport).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_reqwest(defaults: RequestConfig<T>) -> Self {
        Self::new(crate::ReqwestTransport::new(), defaults)
    }

    /// Creates a reqwest-backed client whose defaults come from the environment.
    ///
    /// See [`RequestConfig::from_env`] for the variables read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self::with_reqwest(RequestConfig::from_env()?))
    }

    /// Holds dispatch while `gate` reports offline or background.
    pub fn with_gate(mut self, gate: ConnectivityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// The default configuration layer every request is merged over.
    pub fn defaults(&self) -> &RequestConfig<T> {
        &self.defaults
    }

    /// The connectivity gate, when one was attached with [`Http::with_gate`].
    pub fn gate(&self) -> Option<&ConnectivityGate> {
        self.gate.as_ref()
    }

    /// Runs one logical request described by `options`.
    ///
    /// The per-call configuration is merged over the defaults, then the
    /// request goes through transform, gate, dispatch and retry until it
    /// resolves, fails or is cancelled.
    pub async fn process(&self, options: RequestOptions<T>) -> Result<T> {
        let RequestOptions {
            url,
            method,
            data,
            config,
        } = options;
        let config = merge_config(&config, &self.defaults);
        config.validate()?;

        let options = RequestOptions {
            url,
            method,
            data,
            config,
        };
        lifecycle::run(self.transport.as_ref(), self.gate.as_ref(), options).await
    }

    /// Verb-style entry point; `url` may contain `{key}` tokens.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        data: Option<Body>,
        config: RequestConfig<T>,
    ) -> Result<T> {
        self.process(RequestOptions {
            url: url.to_owned(),
            method,
            data,
            config,
        })
        .await
    }

    /// GET; structured `data` is sent as a query string.
    pub async fn get(&self, url: &str, data: Option<Body>, config: RequestConfig<T>) -> Result<T> {
        self.request(Method::Get, url, data, config).await
    }

    /// POST; `data` is the request body.
    pub async fn post(&self, url: &str, data: Option<Body>, config: RequestConfig<T>) -> Result<T> {
        self.request(Method::Post, url, data, config).await
    }

    /// PUT; `data` is the request body.
    pub async fn put(&self, url: &str, data: Option<Body>, config: RequestConfig<T>) -> Result<T> {
        self.request(Method::Put, url, data, config).await
    }

    /// DELETE; structured `data` is sent as a query string.
    pub async fn delete(
        &self,
        url: &str,
        data: Option<Body>,
        config: RequestConfig<T>,
    ) -> Result<T> {
        self.request(Method::Delete, url, data, config).await
    }

    /// HEAD; structured `data` is sent as a query string.
    pub async fn head(&self, url: &str, data: Option<Body>, config: RequestConfig<T>) -> Result<T> {
        self.request(Method::Head, url, data, config).await
    }

    /// PATCH, sent as POST with `X-HTTP-Method-Override: PATCH`.
    ///
    /// The server has to honour the override header.
    pub async fn patch(
        &self,
        url: &str,
        data: Option<Body>,
        mut config: RequestConfig<T>,
    ) -> Result<T> {
        config
            .headers
            .get_or_insert_with(Default::default)
            .insert(METHOD_OVERRIDE_HEADER.to_owned(), Scalar::text("PATCH"));
        self.request(Method::Post, url, data, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::Http;
    use crate::{RequestConfig, RequestFields, Response, TaskHandle};

    fn echo(fields: RequestFields) -> TaskHandle {
        TaskHandle::ready(Ok(Response::new(200, fields.url)))
    }

    #[test]
    fn new_installs_default_send_transform() {
        let http: Http = Http::new(echo, RequestConfig::new());
        assert!(http.defaults().transform_send.is_some());
        assert!(http.gate().is_none());
    }

    #[test]
    fn debug_lists_defaults() {
        let http: Http = Http::new(echo, RequestConfig::new().with_base_url("https://api"));
        let debug = format!("{http:?}");
        assert!(debug.contains("https://api"));
        assert!(debug.contains("<transport>"));
    }
}
