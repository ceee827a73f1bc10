use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// HTTP verbs understood by the host request primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Options,
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    /// Whether a structured body travels as a query string for this verb.
    pub fn sends_query(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Delete | Self::Options)
    }
}

/// Request or response payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Body {
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns the JSON value when the body is structured.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// How the host primitive should hand back the response body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    #[serde(rename = "arraybuffer")]
    ArrayBuffer,
}

/// Platform-ready fields handed to the transport for one dispatch attempt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestFields {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub data: Option<Body>,
    pub response_type: ResponseType,
}

/// Send/response instants in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub send: Option<u64>,
    pub response: Option<u64>,
}

/// Successful completion reported by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Body,
    /// Filled in by the orchestrator when timestamp recording is enabled.
    pub timestamps: Option<Timestamps>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            timestamps: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<Response> for Body {
    fn from(response: Response) -> Self {
        response.body
    }
}

#[cfg(test)]
mod tests {
    use super::{Body, Method, Response, ResponseType};

    #[test]
    fn method_serializes_uppercase() {
        let json = serde_json::to_string(&Method::Delete).expect("method must serialize");
        assert_eq!(json, "\"DELETE\"");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn response_type_uses_host_spelling() {
        let json = serde_json::to_string(&ResponseType::ArrayBuffer).expect("must serialize");
        assert_eq!(json, "\"arraybuffer\"");
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(304, "").is_success());
        assert!(!Response::new(500, "").is_success());
    }

    #[test]
    fn body_from_response_takes_payload() {
        let body: Body = Response::new(200, serde_json::json!({"ok": true})).into();
        assert_eq!(body.as_json(), Some(&serde_json::json!({"ok": true})));
    }
}
