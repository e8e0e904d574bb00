//! # Dynrest Core
//!
//! `dynrest-core` is the foundational library powering the Dynrest CLI. It builds, at runtime,
//! an HTTP client for any service described by a [`schema::ServiceDescription`], without
//! compile-time knowledge of the service's Rust types.
//!
//! ## Key Components
//!
//! * **[`DynamicClient`]:** The main entry point. Every call goes through the same pipeline:
//!   route resolution, argument binding, content negotiation and URI building, followed by an
//!   inline dispatch or a deferred one depending on the method's declared return type.
//! * **[`Outcome`] & [`DeferredHandle`]:** What a call returns. Plain methods produce a value,
//!   methods returning `Deferred<T>` produce a handle that can be awaited, polled or cancelled.
//!
//! ## Pipeline stages
//!
//! Each stage lives in its own module and can be used on its own:
//!
//! * [`route`]: merges interface-level and method-level routing metadata.
//! * [`binding`]: maps call arguments to path variables, query parameters, headers and body.
//! * [`negotiation`]: picks `Accept` and `Content-Type` against what the transport supports.
//! * [`uri`]: expands the path template into the request target.
//! * [`dispatch`]: hands the finished request to the [`Transport`].
//! * [`deferred`] & [`runner`]: run dispatches in the background.
//!
//! ## Transport
//!
//! [`rest::transport::HttpTransport`] is the default [`Transport`]. It is backed by `reqwest`
//! and encodes/decodes bodies with the codecs in [`rest::codec`]. Any other type implementing
//! [`Transport`] can be plugged into the client builder.
//!
//! ## Re-exports
//!
//! This crate re-exports `http`, `reqwest` and `serde_json` to ensure that consumers
//! use compatible versions of these underlying dependencies.
//!
//! See the README.md for more details about usage.
pub mod binding;
pub mod client;
pub mod config;
pub mod deferred;
pub mod dispatch;
pub mod negotiation;
pub mod rest;
pub mod route;
pub mod runner;
pub mod schema;
pub mod uri;

pub use client::{ClientBuilder, DynamicClient, InvokeError, Outcome};
pub use deferred::DeferredHandle;
pub use rest::transport::Transport;

// Re-exports
pub use http;
pub use reqwest;
pub use serde_json;
pub use url;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
