//! # Content Negotiation
//!
//! Decides which media types a request advertises in `Accept` and which one it declares in
//! `Content-Type`, given what the route declares and what the transport can actually handle.
//!
//! * **Accept**: the route's `produces` list when it has one, otherwise every media type the
//!   transport supports.
//! * **Content-Type**: only for requests carrying a body. The first entry of the route's
//!   `consumes` list (in declaration order) that the transport supports wins. An empty
//!   `consumes` list leaves the choice to the transport.
use http::{
    HeaderMap, HeaderValue,
    header::{ACCEPT, CONTENT_TYPE, InvalidHeaderValue},
};
use mime::Mime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// A parsed media type such as `application/json` or a pattern such as `application/*+json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(Mime);

impl MediaType {
    pub fn new(mime: Mime) -> Self {
        Self(mime)
    }

    pub fn json() -> Self {
        Self(mime::APPLICATION_JSON)
    }

    pub fn text() -> Self {
        Self(mime::TEXT_PLAIN)
    }

    pub fn form_urlencoded() -> Self {
        Self(mime::APPLICATION_WWW_FORM_URLENCODED)
    }

    pub fn mime(&self) -> &Mime {
        &self.0
    }

    /// The `type/subtype` part, without parameters.
    pub fn essence(&self) -> &str {
        self.0.essence_str()
    }

    /// Whether this is a pattern (`*/*`, `text/*`, `application/*+json`) rather than a concrete type.
    pub fn is_wildcard(&self) -> bool {
        self.0.type_() == mime::STAR || self.0.subtype() == mime::STAR
    }

    /// Whether every media type matched by `other` is also matched by `self`.
    ///
    /// `*/*` includes everything, `text/*` includes `text/plain`, and
    /// `application/*+json` includes `application/problem+json`.
    pub fn includes(&self, other: &MediaType) -> bool {
        let (this, other) = (&self.0, &other.0);

        if this.type_() == mime::STAR {
            return true;
        }
        if this.type_() != other.type_() {
            return false;
        }
        if this.subtype() == mime::STAR {
            return match this.suffix() {
                None => true,
                Some(suffix) => {
                    other.suffix() == Some(suffix) || other.subtype() == suffix.as_str()
                }
            };
        }

        this.subtype() == other.subtype() && this.suffix() == other.suffix()
    }

    pub fn is_compatible_with(&self, other: &MediaType) -> bool {
        self.includes(other) || other.includes(self)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MediaType {
    type Err = mime::FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<Mime> for MediaType {
    fn from(mime: Mime) -> Self {
        Self(mime)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid media type '{raw}': {e}")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error(
        "Could not write request: no supported content type for a body of type '{body_type}' and content types [{}]",
        join(consumes)
    )]
    NoCompatibleContentType {
        body_type: &'static str,
        consumes: Vec<MediaType>,
    },
    #[error("Media type '{media_type}' is not a valid header value: '{source}'")]
    InvalidHeaderValue {
        media_type: String,
        source: InvalidHeaderValue,
    },
}

/// The media types picked for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub accept: Vec<MediaType>,
    /// `None` when the request has no body or when the route leaves the choice to the transport.
    pub content_type: Option<MediaType>,
}

impl Negotiated {
    /// Writes `Accept` and, when chosen, `Content-Type` into `headers`, replacing existing values.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), NegotiationError> {
        if !self.accept.is_empty() {
            headers.insert(ACCEPT, header_value(&join(&self.accept))?);
        }
        if let Some(content_type) = &self.content_type {
            headers.insert(CONTENT_TYPE, header_value(&content_type.to_string())?);
        }
        Ok(())
    }
}

/// Picks the `Accept` and `Content-Type` media types for a request.
///
/// # Arguments
///
/// * `supported` - Media types the transport's codecs can read and write.
/// * `produces` - Media types the route declares it responds with.
/// * `consumes` - Media types the route declares it accepts as a request body.
/// * `body` - The request body, if any.
///
/// # Returns
///
/// * `Ok(Negotiated)` - The chosen media types.
/// * `Err(NegotiationError)` - If the request has a body and none of `consumes` is supported.
pub fn negotiate(
    supported: &[MediaType],
    produces: &[MediaType],
    consumes: &[MediaType],
    body: Option<&Value>,
) -> Result<Negotiated, NegotiationError> {
    let accept = if produces.is_empty() {
        supported.to_vec()
    } else {
        produces.to_vec()
    };

    let content_type = match body {
        Some(body) if !consumes.is_empty() => {
            let chosen = consumes.iter().find_map(|declared| {
                supported
                    .iter()
                    .filter(|candidate| candidate.is_compatible_with(declared))
                    .find_map(|candidate| concrete(declared, candidate))
            });

            match chosen {
                Some(media_type) => Some(media_type),
                None => {
                    return Err(NegotiationError::NoCompatibleContentType {
                        body_type: value_kind(body),
                        consumes: consumes.to_vec(),
                    });
                }
            }
        }
        _ => None,
    };

    Ok(Negotiated {
        accept,
        content_type,
    })
}

/// A `Content-Type` must be concrete, so a declared pattern defers to the supported type.
/// Two patterns give nothing to send.
fn concrete(declared: &MediaType, supported: &MediaType) -> Option<MediaType> {
    match (declared.is_wildcard(), supported.is_wildcard()) {
        (false, _) => Some(declared.clone()),
        (true, false) => Some(supported.clone()),
        (true, true) => None,
    }
}

/// Names the JSON kind of a value, used where a runtime type has to be reported.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(media_types: &[MediaType]) -> String {
    media_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn header_value(raw: &str) -> Result<HeaderValue, NegotiationError> {
    HeaderValue::from_str(raw).map_err(|source| NegotiationError::InvalidHeaderValue {
        media_type: raw.to_string(),
        source,
    })
}
