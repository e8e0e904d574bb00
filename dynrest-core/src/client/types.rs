use crate::{
    deferred::DeferredHandle,
    rest::transport::{NegotiatedRequest, ResponseType},
    route::RouteSpec,
    schema::{Parameter, TypeExpr},
};
use serde_json::Value;
use std::fmt;

/// The name of the generic wrapper that marks a method as deferred.
pub const DEFERRED: &str = "Deferred";

/// How a method delivers its result, derived from its declared return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// The call waits for the response and returns its value.
    Immediate(ResponseType),
    /// `Deferred<T>`: the call returns a [`DeferredHandle`] and the response is read as `T`.
    /// A bare `Deferred` is read dynamically.
    Deferred(ResponseType),
}

impl ReturnShape {
    pub fn of(returns: &TypeExpr) -> Self {
        if returns.name == DEFERRED {
            let inner = returns
                .args
                .first()
                .map(ResponseType::of)
                .unwrap_or(ResponseType::Dynamic);
            ReturnShape::Deferred(inner)
        } else {
            ReturnShape::Immediate(ResponseType::of(returns))
        }
    }

    /// The type the response body is decoded as.
    pub fn response_type(&self) -> &ResponseType {
        match self {
            ReturnShape::Immediate(expected) | ReturnShape::Deferred(expected) => expected,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, ReturnShape::Deferred(_))
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::Immediate(expected) => write!(f, "{expected}"),
            ReturnShape::Deferred(expected) => write!(f, "{DEFERRED}<{expected}>"),
        }
    }
}

/// A method of the service, resolved once when the client is built.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub route: RouteSpec,
    /// The path template, `route.path_segments` concatenated.
    pub template: String,
    pub params: Vec<Parameter>,
    pub returns: TypeExpr,
    pub shape: ReturnShape,
}

/// The result of invoking a method.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The decoded response of an immediate method.
    Value(Value),
    /// The handle to the result of a deferred method.
    Deferred(DeferredHandle<Value>),
}

impl Outcome {
    /// Waits for the value, whether it is already there or still deferred.
    pub async fn resolve(self) -> Result<Value, crate::deferred::DeferredError> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Deferred(handle) => handle.get().await,
        }
    }
}

/// A call that went through binding, negotiation and URI building but was not sent.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub method: String,
    pub shape: ReturnShape,
    pub request: NegotiatedRequest,
}
