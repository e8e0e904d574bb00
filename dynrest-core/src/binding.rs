//! # Argument Binding
//!
//! Walks the declared parameters of a method together with the actual call arguments and
//! sorts every argument into the part of the request it belongs to.
//!
//! Arguments are dynamic [`serde_json::Value`]s. `null` means "no value": optional query
//! parameters and headers then fall back to their declared default, or are left out, while
//! required ones fail the call before anything is sent.
use crate::schema::{Parameter, ParameterRole};
use http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{InvalidHeaderName, InvalidHeaderValue},
};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("Method '{method}' expects {expected} argument(s) but {actual} were supplied")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("Argument {index} ('{name}') cannot be null: query parameter '{name}' is required")]
    MissingQuery { index: usize, name: String },
    #[error("Argument {index} ('{name}') cannot be null: header '{name}' is required")]
    MissingHeader { index: usize, name: String },
    #[error("Invalid header name '{name}': '{source}'")]
    InvalidHeaderName {
        name: String,
        source: InvalidHeaderName,
    },
    #[error("Invalid value for header '{name}': '{source}'")]
    InvalidHeaderValue {
        name: String,
        source: InvalidHeaderValue,
    },
}

/// The positional arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument. Anything serializable to JSON is accepted.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Arguments {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where the arguments of one call ended up.
#[derive(Debug, Clone, Default)]
pub struct BoundArguments {
    pub path_vars: HashMap<String, String>,
    /// Query pairs in parameter declaration order.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Binds `arguments` to the roles declared by `parameters`.
///
/// Every role of a parameter binds independently, so one argument may feed, for example, both
/// a header and a query parameter. When several parameters are bound as body, the last one
/// wins, so a trailing `null` leaves the request without a body.
///
/// # Returns
///
/// * `Ok(BoundArguments)` - The path variables, query pairs, headers and body of the request.
/// * `Err(BindingError)` - If the argument count is wrong, a required value is missing or a
///   header cannot be represented.
pub fn bind(
    method: &str,
    parameters: &[Parameter],
    arguments: &Arguments,
) -> Result<BoundArguments, BindingError> {
    if parameters.len() != arguments.len() {
        return Err(BindingError::ArityMismatch {
            method: method.to_string(),
            expected: parameters.len(),
            actual: arguments.len(),
        });
    }

    let mut bound = BoundArguments::default();

    for (index, (parameter, argument)) in parameters.iter().zip(arguments.iter()).enumerate() {
        for role in &parameter.roles {
            match role {
                ParameterRole::PathVariable { name } => {
                    // A null path variable stays unbound and fails URI expansion.
                    if let Some(value) = stringify(argument) {
                        bound.path_vars.insert(name.clone(), value);
                    }
                }
                ParameterRole::Query {
                    name,
                    default,
                    required,
                } => match resolve(argument, default.as_deref()) {
                    Some(value) => bound.query.push((name.clone(), value)),
                    None if *required => {
                        return Err(BindingError::MissingQuery {
                            index,
                            name: name.clone(),
                        });
                    }
                    None => {}
                },
                ParameterRole::Header {
                    name,
                    default,
                    required,
                } => match resolve(argument, default.as_deref()) {
                    Some(value) => append_header(&mut bound.headers, name, &value)?,
                    None if *required => {
                        return Err(BindingError::MissingHeader {
                            index,
                            name: name.clone(),
                        });
                    }
                    None => {}
                },
                ParameterRole::Body => {
                    bound.body = (!argument.is_null()).then(|| argument.clone());
                }
            }
        }
    }

    Ok(bound)
}

/// String form of an argument used for paths, queries and headers.
///
/// Strings are taken verbatim, other scalars use their display form and composite values are
/// rendered as compact JSON. `null` has no string form.
pub fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn resolve(argument: &Value, default: Option<&str>) -> Option<String> {
    stringify(argument).or_else(|| default.map(str::to_string))
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), BindingError> {
    let key = HeaderName::try_from(name).map_err(|source| BindingError::InvalidHeaderName {
        name: name.to_string(),
        source,
    })?;
    let val = HeaderValue::try_from(value).map_err(|source| BindingError::InvalidHeaderValue {
        name: name.to_string(),
        source,
    })?;
    headers.append(key, val);
    Ok(())
}
