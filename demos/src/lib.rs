//! Shared helpers for the argschema demos.

use argschema::{Cli, Value};

/// Parses the process arguments and prints the value in both its debug form
/// and as JSON.
///
/// Exits with clap's status code when the arguments are rejected.
pub fn run(cli: &Cli) -> Value {
    let value = cli.parse();
    println!("{value}");
    match serde_json::to_string_pretty(&value.to_json()) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("cannot render value as JSON: {err}"),
    }
    value
}
