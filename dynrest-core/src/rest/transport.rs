//! # Transport
//!
//! The [`Transport`] trait is the only way the client reaches the network. It receives a fully
//! prepared [`NegotiatedRequest`] and answers with the decoded response body.
//!
//! [`HttpTransport`] is the default implementation:
//!
//! * **Requests**: the body is encoded by the codec matching the negotiated `Content-Type`
//!   (JSON when the route left the choice open) and sent with `reqwest`.
//! * **Responses**: non-2xx statuses become [`TransportError::Status`]; successful bodies are
//!   decoded according to the expected [`ResponseType`].
use super::codec::{BodyCodec, CodecError, Codecs, JsonCodec};
use crate::{
    BoxError,
    config::{ClientConfig, ConfigError},
    negotiation::MediaType,
    schema::{TypeExpr, Verb},
};
use http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;
use std::{fmt, future::Future};
use tracing::debug;
use url::Url;

/// How the response body of a call should be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseType {
    /// A declared type. Decoded by the codec matching the response `Content-Type`.
    Named(TypeExpr),
    /// `String`: the body as text, whatever its media type.
    Text,
    /// `()`: the body is ignored.
    Unit,
    /// `Any`, or a deferred method without a type argument: decoded on a best-effort basis.
    Dynamic,
}

impl ResponseType {
    pub fn of(expr: &TypeExpr) -> Self {
        match expr.name.as_str() {
            "Any" | "Value" if expr.args.is_empty() => ResponseType::Dynamic,
            "String" if expr.args.is_empty() => ResponseType::Text,
            "()" | "Unit" => ResponseType::Unit,
            _ => ResponseType::Named(expr.clone()),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::Named(expr) => write!(f, "{expr}"),
            ResponseType::Text => f.write_str("String"),
            ResponseType::Unit => f.write_str("()"),
            ResponseType::Dynamic => f.write_str("Any"),
        }
    }
}

/// A request ready to be sent. Built fresh for every call.
#[derive(Debug, Clone)]
pub struct NegotiatedRequest {
    pub uri: Url,
    pub verb: Verb,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub expected: ResponseType,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request to '{uri}' failed: '{source}'")]
    Request {
        uri: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Server responded to '{uri}' with status {status}: '{body}'")]
    Status {
        uri: String,
        status: StatusCode,
        body: String,
    },
    #[error("Invalid 'Content-Type' header '{0}'")]
    InvalidContentType(String),
    #[error("No codec can write a request body as '{0}'")]
    UnwritableBody(MediaType),
    #[error("No codec can read a '{content_type}' response as '{expected}'")]
    UnreadableResponse {
        content_type: MediaType,
        expected: ResponseType,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Transport failure: '{0}'")]
    Custom(#[source] BoxError),
}

/// Performs the request/response exchange for the client.
pub trait Transport: Send + Sync + 'static {
    /// Media types this transport can read and write, in order of preference. Used as the
    /// default `Accept` list and to validate the route's `consumes` list.
    fn supported_media_types(&self) -> Vec<MediaType>;

    /// Sends `request` and returns the decoded response body.
    fn exchange(
        &self,
        request: NegotiatedRequest,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// The default [`Transport`], backed by a `reqwest` client and a [`Codecs`] registry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    codecs: Codecs,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client and the default codecs.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(reqwest::Client::builder().build()?))
    }

    /// Creates a transport whose `reqwest` client applies the timeouts, user agent and default
    /// headers of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder().default_headers(config.header_map()?);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }

        Ok(Self::with_client(builder.build().map_err(ConfigError::Client)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            codecs: Codecs::default(),
        }
    }

    pub fn with_codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    fn encode_body(&self, headers: &mut HeaderMap, body: &Value) -> Result<bytes::Bytes, TransportError> {
        let content_type = match headers.get(CONTENT_TYPE) {
            Some(raw) => media_type_of(raw)?,
            None => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                MediaType::json()
            }
        };

        let codec = self
            .codecs
            .for_media_type(&content_type)
            .ok_or(TransportError::UnwritableBody(content_type))?;

        Ok(codec.encode(body)?)
    }

    fn decode_body(
        &self,
        expected: &ResponseType,
        content_type: Option<MediaType>,
        bytes: &[u8],
    ) -> Result<Value, TransportError> {
        match expected {
            ResponseType::Unit => return Ok(Value::Null),
            ResponseType::Text => {
                return Ok(Value::String(
                    String::from_utf8(bytes.to_vec()).map_err(CodecError::from)?,
                ));
            }
            _ if bytes.is_empty() => return Ok(Value::Null),
            _ => {}
        }

        // Servers that omit the content type are assumed to speak JSON.
        let content_type = content_type.unwrap_or_else(MediaType::json);

        match (self.codecs.for_media_type(&content_type), expected) {
            (Some(codec), _) => Ok(codec.decode(bytes)?),
            (None, ResponseType::Dynamic) => match JsonCodec::default().decode(bytes) {
                Ok(value) => Ok(value),
                Err(_) => Ok(Value::String(
                    String::from_utf8(bytes.to_vec()).map_err(CodecError::from)?,
                )),
            },
            (None, expected) => Err(TransportError::UnreadableResponse {
                content_type,
                expected: expected.clone(),
            }),
        }
    }
}

impl Transport for HttpTransport {
    fn supported_media_types(&self) -> Vec<MediaType> {
        self.codecs.supported_media_types()
    }

    async fn exchange(&self, request: NegotiatedRequest) -> Result<Value, TransportError> {
        let NegotiatedRequest {
            uri,
            verb,
            mut headers,
            body,
            expected,
        } = request;
        let uri = uri.to_string();

        let mut builder = self.client.request(verb.into(), &uri);
        if let Some(body) = &body {
            builder = builder.body(self.encode_body(&mut headers, body)?);
        }

        debug!(%verb, %uri, "sending request");
        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                uri: uri.clone(),
                source,
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(media_type_of)
            .transpose()?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                uri: uri.clone(),
                source,
            })?;
        debug!(%verb, %uri, %status, len = bytes.len(), "received response");

        if !status.is_success() {
            return Err(TransportError::Status {
                uri,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        self.decode_body(&expected, content_type, &bytes)
    }
}

fn media_type_of(raw: &HeaderValue) -> Result<MediaType, TransportError> {
    let text = String::from_utf8_lossy(raw.as_bytes());
    text.parse()
        .map_err(|_| TransportError::InvalidContentType(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::with_client(reqwest::Client::new())
    }

    #[test]
    fn response_type_of_declared_types() {
        let parse = |s: &str| ResponseType::of(&s.parse().unwrap());

        assert_eq!(parse("Any"), ResponseType::Dynamic);
        assert_eq!(parse("String"), ResponseType::Text);
        assert_eq!(parse("()"), ResponseType::Unit);
        assert_eq!(parse("Pet"), ResponseType::Named(TypeExpr::named("Pet")));
        assert_eq!(parse("Vec<Pet>").to_string(), "Vec<Pet>");
    }

    #[test]
    fn decodes_by_response_content_type() {
        let value = transport()
            .decode_body(
                &ResponseType::Named(TypeExpr::named("Pet")),
                Some(MediaType::json()),
                br#"{"id":7}"#,
            )
            .unwrap();

        assert_eq!(value, json!({ "id": 7 }));
    }

    #[test]
    fn unknown_content_type_is_unreadable_for_named_types() {
        let err = transport()
            .decode_body(
                &ResponseType::Named(TypeExpr::named("Pet")),
                Some("image/png".parse().unwrap()),
                b"\x89PNG",
            )
            .unwrap_err();

        assert!(matches!(err, TransportError::UnreadableResponse { .. }));
    }

    #[test]
    fn dynamic_falls_back_to_text() {
        let value = transport()
            .decode_body(
                &ResponseType::Dynamic,
                Some("application/octet-stream".parse().unwrap()),
                b"plain words",
            )
            .unwrap();

        assert_eq!(value, json!("plain words"));
    }

    #[test]
    fn unit_and_empty_bodies_decode_to_null() {
        let t = transport();

        assert_eq!(
            t.decode_body(&ResponseType::Unit, None, b"ignored").unwrap(),
            Value::Null
        );
        assert_eq!(
            t.decode_body(&ResponseType::Dynamic, None, b"").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn body_without_content_type_is_sent_as_json() {
        let mut headers = HeaderMap::new();

        let bytes = transport()
            .encode_body(&mut headers, &json!({ "name": "rex" }))
            .unwrap();

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(&bytes[..], br#"{"name":"rex"}"#);
    }

    #[test]
    fn builds_from_config() {
        let config = ClientConfig::from_json(
            r#"{ "timeout_ms": 1000, "user_agent": "tests", "default_headers": { "x-key": "1" } }"#,
        )
        .unwrap();

        assert!(HttpTransport::from_config(&config).is_ok());
    }

    #[test]
    fn body_with_unknown_content_type_fails() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));

        let err = transport()
            .encode_body(&mut headers, &json!("x"))
            .unwrap_err();

        assert!(matches!(err, TransportError::UnwritableBody(_)));
    }
}
