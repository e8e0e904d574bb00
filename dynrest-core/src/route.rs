//! # Route Resolution
//!
//! Merges the routing metadata declared on an interface with the metadata declared on one of
//! its methods. Interface metadata is applied first and method metadata on top of it:
//!
//! * the first declared path of each level is appended (interface prefix, then method suffix);
//! * the first declared verb overwrites the previous one, `GET` when none is declared;
//! * a non-empty `consumes` or `produces` list replaces the previous one entirely.
use crate::{
    negotiation::MediaType,
    schema::{RouteMetadata, Verb},
};

/// The effective route of one method.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteSpec {
    pub path_segments: Vec<String>,
    pub verb: Verb,
    pub consumes: Vec<MediaType>,
    pub produces: Vec<MediaType>,
}

impl RouteSpec {
    pub fn resolve(interface: &RouteMetadata, method: &RouteMetadata) -> Self {
        let mut spec = Self::default();
        spec.apply(interface);
        spec.apply(method);
        spec
    }

    fn apply(&mut self, metadata: &RouteMetadata) {
        if let Some(path) = metadata.path.first() {
            self.path_segments.push(path.clone());
        }
        if let Some(verb) = metadata.verb.first() {
            self.verb = *verb;
        }
        if !metadata.consumes.is_empty() {
            self.consumes = metadata.consumes.clone();
        }
        if !metadata.produces.is_empty() {
            self.produces = metadata.produces.clone();
        }
    }

    /// The path template of the route, segments concatenated in order.
    pub fn path_template(&self) -> String {
        self.path_segments.concat()
    }
}
