//! # HTTP Transport
//!
//! This module contains the default collaborators the client uses to talk to a server: the
//! [`transport::Transport`] contract with its `reqwest`-backed implementation, and the body
//! codecs that turn request and response bodies into dynamic [`serde_json::Value`]s.
pub mod codec;
pub mod transport;
