//! # Client Builder
//!
//! Assembles a [`DynamicClient`] from a service description. The transport and the runner are
//! optional: when none is given, a [`HttpTransport`] and a [`TaskRunner`] on the current tokio
//! runtime are created by [`ClientBuilder::build`].
use super::{DynamicClient, MethodEntry, MethodTable, ReturnShape};
use crate::{
    config::{ClientConfig, ConfigError, RunnerKind},
    dispatch::Dispatcher,
    rest::transport::{HttpTransport, Transport},
    route::RouteSpec,
    runner::{AnyRunner, DetachedRunner, Runner, TaskRunner},
    schema::{MethodDescription, ParameterRole, ServiceDescription},
    uri::{BaseAddress, UriBuildError},
};
use std::{collections::HashMap, sync::Arc};
use tokio::runtime::TryCurrentError;
use tracing::{debug, warn};

/// Errors that can occur when building a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    InvalidBaseAddress(UriBuildError),
    #[error("No base address given")]
    MissingBaseAddress,
    #[error("Failed to create the default HTTP transport: '{0}'")]
    Transport(#[source] reqwest::Error),
    #[error("Deferred calls need a tokio runtime: '{0}'")]
    NoRuntime(#[from] TryCurrentError),
    #[error("Method '{method}' is declared more than once in service '{service}'")]
    DuplicateMethod { service: String, method: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A builder part that is either supplied by the caller or created at build time.
enum Part<P> {
    Given(P),
    Default(fn() -> Result<P, ClientBuildError>),
}

impl<P> Part<P> {
    fn resolve(self) -> Result<P, ClientBuildError> {
        match self {
            Part::Given(part) => Ok(part),
            Part::Default(make) => make(),
        }
    }
}

pub struct ClientBuilder<T = HttpTransport, R = TaskRunner> {
    description: ServiceDescription,
    base_address: String,
    transport: Part<T>,
    runner: Part<R>,
}

impl ClientBuilder {
    pub fn new(description: ServiceDescription, base_address: impl Into<String>) -> Self {
        Self {
            description,
            base_address: base_address.into(),
            transport: Part::Default(|| HttpTransport::new().map_err(ClientBuildError::Transport)),
            runner: Part::Default(|| Ok(TaskRunner::current()?)),
        }
    }
}

impl ClientBuilder<HttpTransport, AnyRunner> {
    /// A builder whose transport, runner and base address come from `config`.
    pub fn from_config(
        description: ServiceDescription,
        config: &ClientConfig,
    ) -> Result<Self, ClientBuildError> {
        let base_address = config
            .base_address
            .clone()
            .ok_or(ClientBuildError::MissingBaseAddress)?;

        let runner: Part<AnyRunner> = match config.runner {
            RunnerKind::Task => Part::Default(|| Ok(AnyRunner::Task(TaskRunner::current()?))),
            RunnerKind::Detached => {
                Part::Default(|| Ok(AnyRunner::Detached(DetachedRunner::current()?)))
            }
        };

        Ok(Self {
            description,
            base_address,
            transport: Part::Given(HttpTransport::from_config(config)?),
            runner,
        })
    }
}

impl<T, R> ClientBuilder<T, R> {
    /// Uses `transport` instead of the default one.
    pub fn transport<U: Transport>(self, transport: U) -> ClientBuilder<U, R> {
        ClientBuilder {
            description: self.description,
            base_address: self.base_address,
            transport: Part::Given(transport),
            runner: self.runner,
        }
    }

    /// Uses `runner` for deferred calls instead of the default one.
    pub fn runner<Q: Runner>(self, runner: Q) -> ClientBuilder<T, Q> {
        ClientBuilder {
            description: self.description,
            base_address: self.base_address,
            transport: self.transport,
            runner: Part::Given(runner),
        }
    }

    /// Resolves every method of the description and builds the client.
    ///
    /// # Returns
    ///
    /// * `Ok(DynamicClient)` - The ready client.
    /// * `Err(ClientBuildError)` - If the base address is invalid, a method is declared twice or
    ///   a default part could not be created.
    pub fn build(self) -> Result<DynamicClient<T, R>, ClientBuildError>
    where
        T: Transport,
        R: Runner,
    {
        let base_address =
            BaseAddress::parse(&self.base_address).map_err(ClientBuildError::InvalidBaseAddress)?;

        let methods = method_table(&self.description)?;
        let transport = self.transport.resolve()?;
        let runner = self.runner.resolve()?;
        let supported = transport.supported_media_types();

        debug!(
            service = %self.description.name,
            methods = methods.entries.len(),
            base_address = %self.base_address,
            "built client"
        );

        Ok(DynamicClient {
            service: Arc::from(self.description.name),
            base_address: Arc::new(base_address),
            methods: Arc::new(methods),
            supported: Arc::from(supported),
            dispatcher: Dispatcher::new(transport),
            runner: Arc::new(runner),
        })
    }
}

fn method_table(description: &ServiceDescription) -> Result<MethodTable, ClientBuildError> {
    let mut entries = Vec::with_capacity(description.methods.len());
    let mut index = HashMap::with_capacity(description.methods.len());

    for method in &description.methods {
        if index.insert(method.name.clone(), entries.len()).is_some() {
            return Err(ClientBuildError::DuplicateMethod {
                service: description.name.clone(),
                method: method.name.clone(),
            });
        }
        lint(&description.name, method);

        let route = RouteSpec::resolve(&description.route, &method.route);
        entries.push(MethodEntry {
            name: method.name.clone(),
            template: route.path_template(),
            route,
            params: method.params.clone(),
            returns: method.returns.clone(),
            shape: ReturnShape::of(&method.returns),
        });
    }

    Ok(MethodTable { entries, index })
}

/// Reports declarations that are allowed but probably not intended.
fn lint(service: &str, method: &MethodDescription) {
    for param in method.params.iter().filter(|p| p.roles.len() > 1) {
        warn!(
            service,
            method = %method.name,
            param = %param.name,
            roles = param.roles.len(),
            "parameter has several roles, each one is bound"
        );
    }

    let bodies = method
        .params
        .iter()
        .filter(|p| p.roles.contains(&ParameterRole::Body))
        .count();
    if bodies > 1 {
        warn!(
            service,
            method = %method.name,
            bodies,
            "several body parameters, only the last one is sent"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rest::transport::ResponseType, schema::Verb};

    fn description(raw: &str) -> ServiceDescription {
        ServiceDescription::from_json(raw).unwrap()
    }

    #[test]
    fn resolves_methods_once() {
        let table = method_table(&description(
            r#"{
                "name": "Pets",
                "route": { "path": ["/api"] },
                "methods": [
                    { "name": "get", "route": { "path": ["/pets/{id}"] }, "returns": "Pet" },
                    { "name": "create", "route": { "path": ["/pets"], "verb": ["POST"] }, "returns": "Deferred<Pet>" }
                ]
            }"#,
        ))
        .unwrap();

        let get = &table.entries[table.index["get"]];
        assert_eq!(get.template, "/api/pets/{id}");
        assert_eq!(get.route.verb, Verb::Get);
        assert!(!get.shape.is_deferred());

        let create = &table.entries[table.index["create"]];
        assert_eq!(create.route.verb, Verb::Post);
        assert_eq!(
            create.shape,
            ReturnShape::Deferred(ResponseType::Named("Pet".parse().unwrap()))
        );
    }

    #[test]
    fn duplicate_methods_are_rejected() {
        let err = method_table(&description(
            r#"{ "name": "Pets", "methods": [{ "name": "get" }, { "name": "get" }] }"#,
        ))
        .err()
        .unwrap();

        assert!(matches!(err, ClientBuildError::DuplicateMethod { ref method, .. } if method == "get"));
    }

    #[test]
    fn base_address_is_checked_before_anything_else() {
        for address in ["", "localhost:8080", "http://bad host"] {
            let err = ClientBuilder::new(description(r#"{ "name": "Pets" }"#), address)
                .build()
                .err()
                .unwrap();

            assert!(matches!(err, ClientBuildError::InvalidBaseAddress(_)), "{address}");
        }
    }

    #[test]
    fn from_config_requires_base_address() {
        let err = ClientBuilder::from_config(
            description(r#"{ "name": "Pets" }"#),
            &ClientConfig::default(),
        )
        .err()
        .unwrap();

        assert!(matches!(err, ClientBuildError::MissingBaseAddress));
    }

    #[test]
    fn default_runner_needs_a_runtime() {
        let err = ClientBuilder::new(description(r#"{ "name": "Pets" }"#), "http://host")
            .build()
            .err()
            .unwrap();

        assert!(matches!(err, ClientBuildError::NoRuntime(_)));
    }
}
