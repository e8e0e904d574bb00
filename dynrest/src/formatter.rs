use colored::*;
use dynrest_core::{
    InvokeError,
    client::{ClientBuildError, MethodEntry, PreparedCall},
    config::ConfigError,
    deferred::DeferredError,
    schema::{DescriptionError, Parameter, ParameterRole},
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct MethodList<'a>(pub &'a str, pub Vec<&'a MethodEntry>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<InvokeError> for FormattedString {
    fn from(err: InvokeError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err))
    }
}

impl From<DeferredError> for FormattedString {
    fn from(err: DeferredError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Deferred Call Failed:".red().bold(), err))
    }
}

impl From<ClientBuildError> for FormattedString {
    fn from(err: ClientBuildError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Client Setup Failed:".red().bold(), err))
    }
}

impl From<ConfigError> for FormattedString {
    fn from(err: ConfigError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Invalid Config:".red().bold(), err))
    }
}

impl From<DescriptionError> for FormattedString {
    fn from(err: DescriptionError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to load service description:".red().bold(),
            err
        ))
    }
}

impl From<MethodList<'_>> for FormattedString {
    fn from(MethodList(service, methods): MethodList<'_>) -> Self {
        if methods.is_empty() {
            return FormattedString(format!("No methods found in '{service}'.").yellow().to_string());
        }

        let mut out = format!("Methods of {}:\n", service.green());
        for method in methods {
            out.push_str(&format!(
                "  - {} {} {}\n",
                method.name.green(),
                method.route.verb.to_string().cyan(),
                method.template
            ));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<&MethodEntry> for FormattedString {
    fn from(method: &MethodEntry) -> Self {
        let params: Vec<String> = method.params.iter().map(describe_param).collect();

        let mut out = format!(
            "{} {}({}) -> {};\n",
            "fn".cyan(),
            method.name.green(),
            params.join(", "),
            method.shape.to_string().yellow()
        );
        out.push_str(&format!(
            "  {} {}\n",
            method.route.verb.to_string().cyan(),
            method.template
        ));
        if !method.route.consumes.is_empty() {
            out.push_str(&format!("  {} {}\n", "consumes".cyan(), join(&method.route.consumes)));
        }
        if !method.route.produces.is_empty() {
            out.push_str(&format!("  {} {}\n", "produces".cyan(), join(&method.route.produces)));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<PreparedCall> for FormattedString {
    fn from(call: PreparedCall) -> Self {
        let request = call.request;
        let mut out = format!("{} {}\n", request.verb.to_string().cyan(), request.uri);
        for (name, value) in &request.headers {
            out.push_str(&format!(
                "{}: {}\n",
                name.as_str().yellow(),
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        if let Some(body) = &request.body {
            out.push('\n');
            out.push_str(&serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string()));
            out.push('\n');
        }
        out.push_str(&format!("\n{} {}", "returns".cyan(), call.shape));
        FormattedString(out)
    }
}

fn describe_param(param: &Parameter) -> String {
    let roles: Vec<String> = param
        .roles
        .iter()
        .map(|role| match role {
            ParameterRole::PathVariable { name } => format!("path {{{name}}}"),
            ParameterRole::Query {
                name,
                default,
                required,
            } => format!("query {name}{}", optional_suffix(default.as_deref(), *required)),
            ParameterRole::Header {
                name,
                default,
                required,
            } => format!("header {name}{}", optional_suffix(default.as_deref(), *required)),
            ParameterRole::Body => "body".to_string(),
        })
        .collect();

    if roles.is_empty() {
        format!("{}: {}", param.name, "unbound".dimmed())
    } else {
        format!("{}: {}", param.name, roles.join(" + ").yellow())
    }
}

fn optional_suffix(default: Option<&str>, required: bool) -> String {
    match (default, required) {
        (Some(default), _) => format!(" = {default:?}"),
        (None, false) => "?".to_string(),
        (None, true) => String::new(),
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynrest_core::schema::ServiceDescription;
    use dynrest_core::{DynamicClient, binding::Arguments};

    const DESCRIPTION: &str = r#"{
        "name": "Pets",
        "route": { "produces": ["application/json"] },
        "methods": [{
            "name": "list_pets",
            "route": { "path": ["/pets"] },
            "params": [
                { "name": "limit", "roles": [{ "role": "query", "name": "limit", "required": false }] },
                { "name": "trace", "roles": [{ "role": "header", "name": "x-trace", "default": "none" }] }
            ],
            "returns": "Deferred<Vec<Pet>>"
        }]
    }"#;

    fn client() -> DynamicClient {
        DynamicClient::builder(ServiceDescription::from_json(DESCRIPTION).unwrap(), "http://host")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn describes_methods() {
        colored::control::set_override(false);
        let client = client();

        let out = FormattedString::from(client.method("list_pets").unwrap()).0;

        assert_eq!(
            out,
            "fn list_pets(limit: query limit?, trace: header x-trace = \"none\") -> Deferred<Vec<Pet>>;\n  GET /pets\n  produces application/json"
        );
    }

    #[tokio::test]
    async fn lists_methods() {
        colored::control::set_override(false);
        let client = client();

        let out = FormattedString::from(MethodList(client.service(), client.methods().collect())).0;

        assert_eq!(out, "Methods of Pets:\n  - list_pets GET /pets");
    }

    #[tokio::test]
    async fn prints_prepared_calls() {
        colored::control::set_override(false);
        let client = client();

        let prepared = client
            .prepare("list_pets", Arguments::new().arg(5).arg(serde_json::Value::Null))
            .unwrap();
        let out = FormattedString::from(prepared).0;

        assert!(out.starts_with("GET http://host/pets?limit=5\n"));
        assert!(out.contains("x-trace: none"));
        assert!(out.contains("accept: application/json"));
        assert!(out.ends_with("returns Deferred<Vec<Pet>>"));
    }
}
