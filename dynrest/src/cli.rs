//! # CLI
//!
//! This module defines the command-line interface of `dynrest` using `clap`.
//!
//! It is responsible for parsing user input. Call arguments are read as JSON when they parse
//! as JSON and as plain strings otherwise, so `--arg 7`, `--arg '{"name":"rex"}'` and
//! `--arg rex` all work.
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dynrest", version, about = "Dynamic HTTP CLI")]
pub struct Cli {
    /// The base address of the service (e.g. http://localhost:8080/api)
    pub url: String,

    /// Path to the JSON service description
    #[arg(short, long)]
    pub description: PathBuf,

    /// Path to a JSON client config file (timeouts, default headers, runner)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Invoke a method of the service
    ///
    /// Arguments are positional and must match the method's parameters in number and order.
    /// Pass `null` to leave an optional parameter out.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// dynrest http://localhost:8080 -d pets.json call get_pet --arg 7
    /// dynrest http://localhost:8080 -d pets.json call create_pet --arg '{"name": "rex"}'
    /// ```
    Call {
        /// Method name
        method: String,

        #[arg(short = 'a', long = "arg", value_parser = parse_arg)]
        args: Vec<Value>,

        /// Print the request that would be sent instead of sending it
        #[arg(long)]
        dry_run: bool,

        /// How long to wait for a deferred method before cancelling it
        #[arg(long)]
        wait_ms: Option<u64>,
    },

    /// List the methods of the service
    List,

    /// Describe a method: its route, parameters and return type
    Describe {
        /// Method name
        method: String,
    },
}

fn parse_arg(value: &str) -> Result<Value, String> {
    Ok(serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string())))
}
