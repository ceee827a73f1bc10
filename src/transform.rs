//! Stock send/response transforms.

use std::sync::Arc;

use futures::future::{self, FutureExt};

use crate::{
    build_params, error::BoxError, Body, RequestFields, RequestOptions, Response,
    ResponseTransform, SendTransform,
};

/// Non-2xx response rejected by [`transform_response_ok_data`].
#[derive(Debug, thiserror::Error)]
#[error("http error {status}")]
pub struct StatusError {
    pub status: u16,
    pub body: Body,
}

/// Builds transport fields straight from the merged options.
///
/// Resolves the URL with [`build_params`], stringifies headers (null values
/// are dropped) and copies method, data and response type.
pub fn transform_send_default<T>(options: &RequestOptions<T>) -> RequestFields {
    let config = &options.config;
    RequestFields {
        url: build_params(&options.url, config.params.as_ref(), config.base_url.as_deref()),
        method: options.method,
        headers: config
            .headers
            .iter()
            .flatten()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect(),
        data: options.data.clone(),
        response_type: config.response_type.unwrap_or_default(),
    }
}

/// [`transform_send_default`] as a [`SendTransform`].
pub fn default_send_transform<T: 'static>() -> SendTransform<T> {
    Arc::new(|options: &RequestOptions<T>| {
        future::ready(Ok(transform_send_default(options))).boxed()
    })
}

/// Resolves with the body of a 2xx response, rejects anything else.
pub fn transform_response_ok_data(response: Response) -> Result<Body, BoxError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(Box::new(StatusError {
            status: response.status,
            body: response.body,
        }))
    }
}

/// [`transform_response_ok_data`] as a [`ResponseTransform`].
pub fn ok_data_transform() -> ResponseTransform<Body> {
    Arc::new(|response: Response, _: &RequestOptions<Body>| {
        future::ready(transform_response_ok_data(response)).boxed()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{transform_response_ok_data, transform_send_default, StatusError};
    use crate::{
        headers, Body, Method, Params, RequestConfig, RequestOptions, Response, ResponseType,
        Scalar,
    };

    #[test]
    fn default_send_builds_url_and_string_headers() {
        let options: RequestOptions<Response> = RequestOptions::new(Method::Put, "/items/{id}")
            .with_data(json!({"name": "kit"}))
            .with_config(
                RequestConfig::new()
                    .with_base_url("https://api.test")
                    .with_params(Params::named([("id", 42)]))
                    .with_headers(headers([
                        ("x-count", Scalar::from(3)),
                        ("x-skip", Scalar::null()),
                    ]))
                    .with_response_type(ResponseType::Text),
            );

        let fields = transform_send_default(&options);

        assert_eq!(fields.url, "https://api.test/items/42");
        assert_eq!(fields.method, Method::Put);
        assert_eq!(fields.headers.get("x-count").map(String::as_str), Some("3"));
        assert!(!fields.headers.contains_key("x-skip"));
        assert_eq!(fields.data, Some(Body::Json(json!({"name": "kit"}))));
        assert_eq!(fields.response_type, ResponseType::Text);
    }

    #[test]
    fn ok_data_rejects_non_success_status() {
        let body = transform_response_ok_data(Response::new(200, "fine")).expect("2xx resolves");
        assert_eq!(body, Body::text("fine"));

        let err = transform_response_ok_data(Response::new(404, "missing"))
            .expect_err("404 must reject");
        let status = err
            .downcast_ref::<StatusError>()
            .expect("rejection carries the status");
        assert_eq!(status.status, 404);
    }
}
