//! # Dynrest CLI Entry Point
//!
//! The main executable for the Dynrest tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs the
//!    log subscriber (`RUST_LOG`, `warn` by default, written to stderr).
//! 2. **Setup**: Loads the service description and the optional config file, then builds a
//!    `DynamicClient` for the given base address.
//! 3. **Execution**: Lists, describes or invokes methods through the client.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.

mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use dynrest_core::{
    DynamicClient, InvokeError, Outcome,
    client::ClientBuilder,
    config::ClientConfig,
    rest::transport::HttpTransport,
    runner::AnyRunner,
    schema::ServiceDescription,
};
use formatter::{FormattedString, MethodList};
use serde_json::Value;
use std::{path::Path, process, time::Duration};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Client = DynamicClient<HttpTransport, AnyRunner>;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = build_or_exit(&args.url, &args.description, args.config.as_deref());

    match args.command {
        Commands::List => list_methods(&client),
        Commands::Describe { method } => describe_method(&client, &method),
        Commands::Call {
            method,
            args,
            dry_run,
            wait_ms,
        } => run_call(&client, &method, args, dry_run, wait_ms).await,
    }
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

fn build_or_exit(url: &str, description: &Path, config: Option<&Path>) -> Client {
    let description = ServiceDescription::from_file(description).unwrap_or_else(|e| exit_with(e));

    let config = match config {
        Some(path) => ClientConfig::from_file(path),
        None => Ok(ClientConfig::default()),
    }
    .and_then(ClientConfig::with_env_overrides);
    let mut config = config.unwrap_or_else(|e| exit_with(e));
    // The address given on the command line always wins.
    config.base_address = Some(url.to_string());

    debug!(service = %description.name, methods = description.methods.len(), "loaded description");

    ClientBuilder::from_config(description, &config)
        .and_then(ClientBuilder::build)
        .unwrap_or_else(|e| exit_with(e))
}

fn list_methods(client: &Client) {
    println!(
        "{}",
        FormattedString::from(MethodList(client.service(), client.methods().collect()))
    );
}

fn describe_method(client: &Client, method: &str) {
    match client.method(method) {
        Some(entry) => println!("{}", FormattedString::from(entry)),
        None => exit_with(InvokeError::MethodNotFound {
            service: client.service().to_string(),
            method: method.to_string(),
        }),
    }
}

async fn run_call(
    client: &Client,
    method: &str,
    args: Vec<Value>,
    dry_run: bool,
    wait_ms: Option<u64>,
) {
    if dry_run {
        match client.prepare(method, args) {
            Ok(prepared) => println!("{}", FormattedString::from(prepared)),
            Err(err) => exit_with(err),
        }
        return;
    }

    match client.invoke(method, args).await {
        Ok(Outcome::Value(value)) => println!("{}", FormattedString::from(value)),
        Ok(Outcome::Deferred(handle)) => {
            let result = match wait_ms {
                Some(ms) => handle.get_timeout(Duration::from_millis(ms)).await,
                None => handle.get().await,
            };
            match result {
                Ok(value) => println!("{}", FormattedString::from(value)),
                Err(err) => {
                    handle.cancel(true);
                    exit_with(err)
                }
            }
        }
        Err(err) => exit_with(err),
    }
}
