//! # Dispatch
//!
//! The last stage of a call: hands the finished [`NegotiatedRequest`] to the [`Transport`].
//! Transport failures are returned unchanged and nothing is retried.
use crate::rest::transport::{NegotiatedRequest, Transport, TransportError};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Executes requests through a shared transport. Cloning shares the transport.
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: Arc<T>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` and waits for the decoded response body.
    pub async fn execute(&self, request: NegotiatedRequest) -> Result<Value, TransportError> {
        debug!(verb = %request.verb, uri = %request.uri, expected = %request.expected, "dispatching");
        let result = self.transport.exchange(request).await;
        if let Err(err) = &result {
            debug!(error = %err, "dispatch failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{negotiation::MediaType, rest::transport::ResponseType, schema::Verb};
    use http::HeaderMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Transport for Canned {
        fn supported_media_types(&self) -> Vec<MediaType> {
            vec![MediaType::json()]
        }

        async fn exchange(&self, request: NegotiatedRequest) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::Custom("connection reset".into()));
            }
            Ok(json!({ "uri": request.uri.to_string() }))
        }
    }

    fn request() -> NegotiatedRequest {
        NegotiatedRequest {
            uri: "http://host/pets/7".parse().unwrap(),
            verb: Verb::Get,
            headers: HeaderMap::new(),
            body: None,
            expected: ResponseType::Dynamic,
        }
    }

    #[tokio::test]
    async fn returns_transport_value_unchanged() {
        let dispatcher = Dispatcher::new(Canned {
            calls: AtomicUsize::new(0),
            fail: false,
        });

        let value = dispatcher.execute(request()).await.unwrap();

        assert_eq!(value, json!({ "uri": "http://host/pets/7" }));
        assert_eq!(dispatcher.transport().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn propagates_failures_without_retrying() {
        let dispatcher = Dispatcher::new(Canned {
            calls: AtomicUsize::new(0),
            fail: true,
        });

        let err = dispatcher.execute(request()).await.unwrap_err();

        assert!(matches!(err, TransportError::Custom(_)));
        assert_eq!(dispatcher.transport().calls.load(Ordering::SeqCst), 1);
    }
}
