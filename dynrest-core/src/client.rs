//! # Dynamic Client
//!
//! This module implements the invocation pipeline behind every call made through a
//! [`DynamicClient`].
//!
//! The client is built once from a [`ServiceDescription`](crate::schema::ServiceDescription).
//! At that point every method is resolved into a [`MethodEntry`]: its effective route, its
//! parameters and the shape of its return type. A call then runs, in order:
//!
//! 1. **Binding**: arguments are sorted into path variables, query pairs, headers and body.
//! 2. **Negotiation**: `Accept` and `Content-Type` are chosen against what the transport supports.
//! 3. **URI building**: the path template is expanded against the base address.
//! 4. **Dispatch**: immediate methods are sent and awaited inline; methods returning
//!    `Deferred<T>` are handed to the runner and return a [`DeferredHandle`] right away.
//!
//! Steps 1 to 3 fail the call before anything is sent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dynrest_core::{DynamicClient, Outcome, binding::Arguments, schema::ServiceDescription};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let description = ServiceDescription::from_file("pets.json")?;
//! let client = DynamicClient::builder(description, "http://localhost:8080").build()?;
//!
//! match client.invoke("get_pet", Arguments::new().arg(7)).await? {
//!     Outcome::Value(pet) => println!("{pet}"),
//!     Outcome::Deferred(handle) => println!("{}", handle.get().await?),
//! }
//! # Ok(())
//! # }
//! ```
pub mod builder;
mod types;

pub use builder::{ClientBuildError, ClientBuilder};
pub use types::*;

use crate::{
    binding::{self, Arguments, BindingError},
    deferred::DeferredHandle,
    dispatch::Dispatcher,
    negotiation::{self, MediaType, NegotiationError},
    rest::transport::{HttpTransport, NegotiatedRequest, Transport, TransportError},
    runner::{Runner, TaskRunner},
    schema::ServiceDescription,
    uri::{self, BaseAddress, UriBuildError},
};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::debug;

/// Errors that can occur when invoking a method.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("Failed to bind arguments: '{0}'")]
    Binding(#[from] BindingError),
    #[error("Content negotiation failed: '{0}'")]
    Negotiation(#[from] NegotiationError),
    #[error("Failed to build request uri: '{0}'")]
    UriBuild(#[from] UriBuildError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub(crate) struct MethodTable {
    entries: Vec<MethodEntry>,
    index: HashMap<String, usize>,
}

impl MethodTable {
    fn get(&self, name: &str) -> Option<&MethodEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }
}

/// A client for one described service.
///
/// `T` is the transport requests are sent through and `R` the runner executing deferred calls.
/// Cloning is cheap: clones share the method table, the transport and the runner.
pub struct DynamicClient<T = HttpTransport, R = TaskRunner> {
    service: Arc<str>,
    base_address: Arc<BaseAddress>,
    methods: Arc<MethodTable>,
    supported: Arc<[MediaType]>,
    dispatcher: Dispatcher<T>,
    runner: Arc<R>,
}

impl DynamicClient {
    /// Starts building a client for `description`, sending requests to `base_address`.
    pub fn builder(description: ServiceDescription, base_address: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(description, base_address)
    }
}

impl<T, R> DynamicClient<T, R>
where
    T: Transport,
    R: Runner,
{
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_address(&self) -> &str {
        self.base_address.as_str()
    }

    /// The resolved methods, in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodEntry> {
        self.methods.entries.iter()
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }

    /// The media types of the transport, computed when the client was built.
    pub fn supported_media_types(&self) -> &[MediaType] {
        &self.supported
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    /// Runs binding, negotiation and URI building for a call without sending it.
    ///
    /// # Returns
    ///
    /// * `Ok(PreparedCall)` - The request the call would send and how its result is delivered.
    /// * `Err(InvokeError)` - If the method is unknown or a stage rejects the arguments.
    pub fn prepare(
        &self,
        method: &str,
        args: impl Into<Arguments>,
    ) -> Result<PreparedCall, InvokeError> {
        let entry = self
            .methods
            .get(method)
            .ok_or_else(|| InvokeError::MethodNotFound {
                service: self.service.to_string(),
                method: method.to_string(),
            })?;
        let args = args.into();

        let bound = binding::bind(&entry.name, &entry.params, &args)?;

        let negotiated = negotiation::negotiate(
            &self.supported,
            &entry.route.produces,
            &entry.route.consumes,
            bound.body.as_ref(),
        )?;

        let uri = uri::build(
            &self.base_address,
            &entry.template,
            &bound.path_vars,
            &bound.query,
        )?;

        let mut headers = bound.headers;
        negotiated.apply(&mut headers)?;

        debug!(
            service = %self.service,
            method = %entry.name,
            verb = %entry.route.verb,
            %uri,
            content_type = ?negotiated.content_type.as_ref().map(ToString::to_string),
            "prepared call"
        );

        Ok(PreparedCall {
            method: entry.name.clone(),
            shape: entry.shape.clone(),
            request: NegotiatedRequest {
                uri,
                verb: entry.route.verb,
                headers,
                body: bound.body,
                expected: entry.shape.response_type().clone(),
            },
        })
    }

    /// Invokes `method` with `args`.
    ///
    /// Immediate methods are sent and awaited before this returns. Deferred methods are handed
    /// to the runner and return as soon as the work is submitted.
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome::Value)` - The decoded response of an immediate method.
    /// * `Ok(Outcome::Deferred)` - The handle to the result of a deferred method.
    /// * `Err(InvokeError)` - If the call could not be prepared, or an immediate call failed.
    pub async fn invoke(
        &self,
        method: &str,
        args: impl Into<Arguments>,
    ) -> Result<Outcome, InvokeError> {
        let PreparedCall { shape, request, .. } = self.prepare(method, args)?;

        if shape.is_deferred() {
            let dispatcher = self.dispatcher.clone();
            let handle = DeferredHandle::submit(self.runner.as_ref(), async move {
                dispatcher.execute(request).await
            });
            debug!(service = %self.service, method, "submitted deferred call");
            return Ok(Outcome::Deferred(handle));
        }

        let value = self.dispatcher.execute(request).await?;
        Ok(Outcome::Value(value))
    }
}

impl<T, R> Clone for DynamicClient<T, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            base_address: Arc::clone(&self.base_address),
            methods: Arc::clone(&self.methods),
            supported: Arc::clone(&self.supported),
            dispatcher: self.dispatcher.clone(),
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<T, R> fmt::Debug for DynamicClient<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicClient")
            .field("service", &self.service)
            .field("base_address", &self.base_address.as_str())
            .field(
                "methods",
                &self.methods.entries.iter().map(|m| &m.name).collect::<Vec<_>>(),
            )
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}
