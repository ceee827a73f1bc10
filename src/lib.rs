//! `mini-request` orchestrates requests over a host-supplied async request
//! primitive.
//!
//! The crate never speaks HTTP itself. It drives a [`Transport`] through:
//! - URL templating and layered configuration ([`build_params`], [`merge_config`])
//! - send/response transforms
//! - retries ([`RetryPolicy`]) and per-attempt timeouts
//! - cooperative cancellation ([`CancelToken`])
//! - connectivity-aware pausing ([`ConnectivityGate`])
//!
//! Entry points live on [`Http`]: [`Http::process`] for a full
//! [`RequestOptions`] descriptor, [`Http::request`] and the verb helpers for
//! method/URL calls.

mod builder;
mod cancel;
mod client;
mod error;
mod gate;
mod lifecycle;
mod options;
mod params;
mod transform;
mod transport;
mod types;
mod value;

pub use builder::{build_params, common_options, merge_config};
pub use cancel::{CancelSource, CancelToken, Subscription};
pub use client::Http;
pub use error::{BoxError, RequestError, TransportFailure};
pub use gate::{ConnectivityGate, GateState};
pub use options::{
    RequestConfig, RequestOptions, ResponseTransform, RetryDecider, RetryPolicy, SendTransform,
    TimestampPolicy, TimestampSink,
};
pub use params::{headers, Headers, Params};
pub use transform::{
    default_send_transform, ok_data_transform, transform_response_ok_data,
    transform_send_default, StatusError,
};
#[cfg(not(target_arch = "wasm32"))]
pub use transport::ReqwestTransport;
pub use transport::{TaskHandle, Transport};
pub use types::{Body, Method, RequestFields, Response, ResponseType, Timestamps};
pub use value::Scalar;

pub type Result<T> = std::result::Result<T, RequestError>;
