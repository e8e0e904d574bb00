//! # URI Building
//!
//! Turns a base address, a route path template and the bound arguments into the concrete
//! request target. Path variable values and query pairs are percent-encoded; literal parts of
//! the template are taken as they are.
//!
//! The base address is parsed once, when the client is built. It may carry `{name}`
//! placeholders of its own, which are expanded with the same path variables as the template.
use std::collections::HashMap;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum UriBuildError {
    #[error("No value bound for path variable '{{{name}}}' in template '{template}'")]
    UnresolvedPlaceholder { name: String, template: String },
    #[error("Unclosed '{{' in path template '{0}'")]
    MalformedTemplate(String),
    #[error("Invalid base address '{address}': '{source}'")]
    InvalidBase {
        address: String,
        source: url::ParseError,
    },
    #[error("Base address '{0}' is not an absolute http(s) address")]
    UnsupportedBase(String),
}

/// A parsed base address.
#[derive(Debug, Clone)]
pub struct BaseAddress {
    raw: String,
    url: Url,
    templated: bool,
}

impl BaseAddress {
    /// Parses `address`, which must be an absolute `http` or `https` address.
    pub fn parse(address: &str) -> Result<Self, UriBuildError> {
        let url = parse_absolute(address)?;
        Ok(Self {
            raw: address.to_string(),
            url,
            templated: address.contains('{'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn resolve(&self, path_vars: &HashMap<String, String>) -> Result<Url, UriBuildError> {
        if !self.templated {
            return Ok(self.url.clone());
        }
        parse_absolute(&expand(&self.raw, path_vars)?)
    }
}

fn parse_absolute(address: &str) -> Result<Url, UriBuildError> {
    let url = Url::parse(address).map_err(|source| UriBuildError::InvalidBase {
        address: address.to_string(),
        source,
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(UriBuildError::UnsupportedBase(address.to_string()));
    }
    Ok(url)
}

/// Builds the request target.
///
/// # Arguments
///
/// * `base` - The base address, e.g. `http://host:8080/api`.
/// * `template` - The path template, e.g. `/pets/{id}`.
/// * `path_vars` - Values for the `{name}` placeholders of the base address and the template.
/// * `query` - Query pairs, appended in order after any query already present in `base`.
///
/// # Returns
///
/// * `Ok(Url)` - The expanded target.
/// * `Err(UriBuildError)` - If a placeholder has no value or the result is not a valid address.
pub fn build(
    base: &BaseAddress,
    template: &str,
    path_vars: &HashMap<String, String>,
    query: &[(String, String)],
) -> Result<Url, UriBuildError> {
    let mut url = base.resolve(path_vars)?;

    let expanded = expand(template, path_vars)?;
    let path = expanded.trim_start_matches('/');
    if !path.is_empty() {
        let base_path = url.path().trim_end_matches('/');
        url.set_path(&format!("{base_path}/{path}"));
    }

    if !query.is_empty() {
        let appended = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let joined = match url.query() {
            Some(current) if !current.is_empty() => format!("{current}&{appended}"),
            _ => appended,
        };
        url.set_query(Some(&joined));
    }

    Ok(url)
}

fn expand(template: &str, path_vars: &HashMap<String, String>) -> Result<String, UriBuildError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| UriBuildError::MalformedTemplate(template.to_string()))?;
        let name = &after[..close];
        let value = path_vars
            .get(name)
            .ok_or_else(|| UriBuildError::UnresolvedPlaceholder {
                name: name.to_string(),
                template: template.to_string(),
            })?;
        out.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
