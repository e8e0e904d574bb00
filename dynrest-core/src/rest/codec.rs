//! # Body Codecs
//!
//! Codecs translate between dynamic [`serde_json::Value`] bodies and the bytes sent over the
//! wire for a given media type. The transport owns a [`Codecs`] registry and:
//!
//! 1. advertises the union of the registered media types as the types it supports;
//! 2. **encodes** a request body with the first codec able to handle the negotiated
//!    `Content-Type`;
//! 3. **decodes** a response body with the first codec able to handle the response's
//!    `Content-Type`.
use crate::{binding::stringify, negotiation::MediaType, negotiation::value_kind};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON body could not be processed: '{0}'")]
    Json(#[from] serde_json::Error),
    #[error("Text body is not valid UTF-8: '{0}'")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("Form body could not be encoded: '{0}'")]
    FormEncode(#[from] serde_urlencoded::ser::Error),
    #[error("Form body could not be decoded: '{0}'")]
    FormDecode(#[from] serde_urlencoded::de::Error),
    #[error("Form bodies must be JSON objects, got '{0}'")]
    NotAnObject(&'static str),
}

/// Reads and writes bodies of a family of media types.
pub trait BodyCodec: Send + Sync {
    /// The media types (or patterns) this codec handles, in order of preference.
    fn media_types(&self) -> &[MediaType];

    fn encode(&self, body: &Value) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    fn handles(&self, media_type: &MediaType) -> bool {
        self.media_types()
            .iter()
            .any(|supported| supported.includes(media_type))
    }
}

/// `application/json` and any `application/*+json` type.
pub struct JsonCodec {
    media_types: Vec<MediaType>,
}

impl Default for JsonCodec {
    fn default() -> Self {
        let suffixed = "application/*+json".parse::<MediaType>().ok();
        Self {
            media_types: std::iter::once(MediaType::json()).chain(suffixed).collect(),
        }
    }
}

impl BodyCodec for JsonCodec {
    fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn encode(&self, body: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(body)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// `text/plain` and any other `text/*` type. Decodes into a JSON string.
pub struct TextCodec {
    media_types: [MediaType; 2],
}

impl Default for TextCodec {
    fn default() -> Self {
        Self {
            media_types: [MediaType::text(), MediaType::new(mime::TEXT_STAR)],
        }
    }
}

impl BodyCodec for TextCodec {
    fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn encode(&self, body: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(stringify(body).unwrap_or_default()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::String(String::from_utf8(bytes.to_vec())?))
    }
}

/// `application/x-www-form-urlencoded`. Bodies are flat JSON objects; array members become
/// repeated keys.
pub struct FormCodec {
    media_types: [MediaType; 1],
}

impl Default for FormCodec {
    fn default() -> Self {
        Self {
            media_types: [MediaType::form_urlencoded()],
        }
    }
}

impl BodyCodec for FormCodec {
    fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn encode(&self, body: &Value) -> Result<Bytes, CodecError> {
        let Value::Object(fields) = body else {
            return Err(CodecError::NotAnObject(value_kind(body)));
        };

        let mut pairs = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            match value {
                Value::Array(items) => pairs.extend(
                    items
                        .iter()
                        .filter_map(stringify)
                        .map(|item| (key.as_str(), item)),
                ),
                other => pairs.extend(stringify(other).map(|item| (key.as_str(), item))),
            }
        }

        Ok(Bytes::from(serde_urlencoded::to_string(pairs)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)?;

        let mut fields = Map::new();
        for (key, value) in pairs {
            match fields.get_mut(&key) {
                None => {
                    fields.insert(key, Value::String(value));
                }
                Some(Value::Array(items)) => items.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
            }
        }

        Ok(Value::Object(fields))
    }
}

/// An ordered set of codecs. Registration order decides both the advertised media types and
/// which codec wins when several handle the same type.
#[derive(Clone)]
pub struct Codecs {
    codecs: Vec<Arc<dyn BodyCodec>>,
}

impl Codecs {
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    pub fn with(mut self, codec: impl BodyCodec + 'static) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }

    pub fn supported_media_types(&self) -> Vec<MediaType> {
        let mut types: Vec<MediaType> = Vec::new();
        for media_type in self.codecs.iter().flat_map(|c| c.media_types()) {
            if !types.contains(media_type) {
                types.push(media_type.clone());
            }
        }
        types
    }

    pub fn for_media_type(&self, media_type: &MediaType) -> Option<&dyn BodyCodec> {
        self.codecs
            .iter()
            .find(|codec| codec.handles(media_type))
            .map(|codec| codec.as_ref())
    }
}

/// JSON, then text, then form.
impl Default for Codecs {
    fn default() -> Self {
        Self::empty()
            .with(JsonCodec::default())
            .with(TextCodec::default())
            .with(FormCodec::default())
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.supported_media_types().iter().map(ToString::to_string))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media(raw: &str) -> MediaType {
        raw.parse().unwrap()
    }

    #[test]
    fn default_registry_advertises_types_in_order() {
        let types: Vec<String> = Codecs::default()
            .supported_media_types()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            types,
            vec![
                "application/json",
                "application/*+json",
                "text/plain",
                "text/*",
                "application/x-www-form-urlencoded"
            ]
        );
    }

    #[test]
    fn json_codec_only_handles_json_types() {
        let codec = JsonCodec::default();

        assert!(codec.handles(&media("application/json")));
        assert!(codec.handles(&media("application/vnd.api+json")));
        assert!(!codec.handles(&media("text/plain")));
        assert!(!codec.handles(&media("application/xml")));
    }

    #[test]
    fn picks_codec_by_media_type() {
        let codecs = Codecs::default();

        let problem = codecs.for_media_type(&media("application/problem+json")).unwrap();
        assert_eq!(problem.decode(br#"{"a":1}"#).unwrap(), json!({ "a": 1 }));

        let html = codecs.for_media_type(&media("text/html; charset=utf-8")).unwrap();
        assert_eq!(html.decode(b"<p>").unwrap(), json!("<p>"));

        assert!(codecs.for_media_type(&media("image/png")).is_none());
    }

    #[test]
    fn json_codec_treats_blank_body_as_null() {
        assert_eq!(JsonCodec::default().decode(b"  ").unwrap(), Value::Null);
    }

    #[test]
    fn text_codec_writes_strings_verbatim() {
        let codec = TextCodec::default();

        assert_eq!(codec.encode(&json!("hello")).unwrap(), Bytes::from("hello"));
        assert_eq!(codec.encode(&json!(12)).unwrap(), Bytes::from("12"));
    }

    #[test]
    fn form_codec_flattens_objects() {
        let codec = FormCodec::default();

        let encoded = codec
            .encode(&json!({ "name": "rex", "tags": ["a", "b"], "age": 3 }))
            .unwrap();

        assert_eq!(encoded, Bytes::from("age=3&name=rex&tags=a&tags=b"));
        assert_eq!(
            codec.decode(&encoded).unwrap(),
            json!({ "age": "3", "name": "rex", "tags": ["a", "b"] })
        );
    }

    #[test]
    fn form_codec_rejects_non_objects() {
        let err = FormCodec::default().encode(&json!([1, 2])).unwrap_err();

        assert!(matches!(err, CodecError::NotAnObject("array")));
    }
}
