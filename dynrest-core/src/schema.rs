//! # Service Descriptions
//!
//! The data a [`crate::DynamicClient`] is built from: an interface (service) with its own
//! routing metadata and a list of methods, each with routing metadata, parameters and a
//! declared return type.
//!
//! Descriptions are plain serde types and are usually loaded from JSON:
//!
//! ```json
//! {
//!   "name": "PetStore",
//!   "route": { "path": ["/pets"], "produces": ["application/json"] },
//!   "methods": [
//!     {
//!       "name": "get_pet",
//!       "route": { "path": ["/{id}"], "verb": ["GET"] },
//!       "params": [{ "name": "id", "roles": [{ "role": "path_variable", "name": "id" }] }],
//!       "returns": "Pet"
//!     }
//!   ]
//! }
//! ```
use crate::negotiation::MediaType;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

/// Errors that can occur when loading a service description.
#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("Failed to read service description '{path}': '{source}'")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid service description: '{0}'")]
    Parse(#[from] serde_json::Error),
}

/// The HTTP verbs a route can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    #[default]
    Get,
    Put,
    Post,
    Delete,
    Head,
    Options,
    Patch,
    Trace,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::Patch => "PATCH",
            Verb::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for http::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => http::Method::GET,
            Verb::Put => http::Method::PUT,
            Verb::Post => http::Method::POST,
            Verb::Delete => http::Method::DELETE,
            Verb::Head => http::Method::HEAD,
            Verb::Options => http::Method::OPTIONS,
            Verb::Patch => http::Method::PATCH,
            Verb::Trace => http::Method::TRACE,
        }
    }
}

/// Routing metadata declared either on the interface or on a method.
///
/// `path` and `verb` are lists because descriptions may declare several, but only the first
/// entry of each is honored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteMetadata {
    pub path: Vec<String>,
    pub verb: Vec<Verb>,
    pub consumes: Vec<MediaType>,
    pub produces: Vec<MediaType>,
}

/// How a single parameter contributes to the outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ParameterRole {
    /// Substitutes the `{name}` placeholder of the path template.
    PathVariable { name: String },
    /// Appends `name=value` to the query string.
    Query {
        name: String,
        #[serde(default)]
        default: Option<String>,
        #[serde(default = "required_by_default")]
        required: bool,
    },
    /// Adds a `name: value` header.
    Header {
        name: String,
        #[serde(default)]
        default: Option<String>,
        #[serde(default = "required_by_default")]
        required: bool,
    },
    /// Sends the argument, unchanged, as the request body.
    Body,
}

fn required_by_default() -> bool {
    true
}

/// A method parameter. A parameter without roles is not sent at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<ParameterRole>,
}

/// A method of the described interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescription {
    pub name: String,
    #[serde(default)]
    pub route: RouteMetadata,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub returns: TypeExpr,
}

/// A described interface: interface-level routing metadata plus its methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub name: String,
    #[serde(default)]
    pub route: RouteMetadata,
    #[serde(default)]
    pub methods: Vec<MethodDescription>,
}

impl ServiceDescription {
    pub fn from_json(raw: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescription> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeExprError {
    #[error("Empty type expression")]
    Empty,
    #[error("Unexpected character '{found}' at offset {offset} in type expression '{expr}'")]
    Unexpected {
        expr: String,
        found: char,
        offset: usize,
    },
    #[error("Unterminated type arguments in type expression '{0}'")]
    Unterminated(String),
}

/// A declared type, possibly generic: `Pet`, `Deferred<Pet>`, `Page<Deferred<Pet>>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeExpr {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Methods with no declared return type accept whatever the server sends.
impl Default for TypeExpr {
    fn default() -> Self {
        Self::named("Any")
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl FromStr for TypeExpr {
    type Err = TypeExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser { src: s, pos: 0 };
        let expr = parser.parse_expr()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(expr),
            Some(c) => Err(parser.unexpected(c)),
        }
    }
}

impl TryFrom<String> for TypeExpr {
    type Error = TypeExprError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeExpr> for String {
    fn from(value: TypeExpr) -> Self {
        value.to_string()
    }
}

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl TypeParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self, found: char) -> TypeExprError {
        TypeExprError::Unexpected {
            expr: self.src.to_string(),
            found,
            offset: self.pos,
        }
    }

    fn parse_expr(&mut self) -> Result<TypeExpr, TypeExprError> {
        self.skip_ws();
        let start = self.pos;
        // `()` is the unit type
        if self.src[self.pos..].starts_with("()") {
            self.pos += 2;
            return Ok(TypeExpr::named("()"));
        }
        while let Some(c) = self
            .peek()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '.'))
        {
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return match self.peek() {
                None => Err(TypeExprError::Empty),
                Some(c) => Err(self.unexpected(c)),
            };
        }
        let name = self.src[start..self.pos].to_string();

        self.skip_ws();
        if self.peek() != Some('<') {
            return Ok(TypeExpr::named(name));
        }
        self.pos += 1;

        let mut args = Vec::new();
        loop {
            args.push(self.parse_expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('>') => {
                    self.pos += 1;
                    return Ok(TypeExpr::generic(name, args));
                }
                Some(c) => return Err(self.unexpected(c)),
                None => return Err(TypeExprError::Unterminated(self.src.to_string())),
            }
        }
    }
}
