//! Subcommand example.
//!
//! A union of structs becomes one subcommand per variant. The parsed value is
//! converted into a plain serde enum with `cli_as`.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p argschema-demos --example subcommands -- cmd:checkout --cmd.branch main
//! cargo run -p argschema-demos --example subcommands -- cmd:commit --cmd.message "fix" --cmd.all
//! ```

use argschema::{FieldSchema, StructSchema, TypeDescriptor, cli_as};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Action {
    Checkout { branch: String },
    Commit { message: String, all: bool },
}

#[derive(Debug, Deserialize)]
struct Args {
    cmd: Action,
    dry_run: bool,
}

fn main() {
    let checkout = StructSchema::new("Checkout")
        .description("Check out a branch.")
        .field(FieldSchema::new("branch", TypeDescriptor::string()).help("Branch to check out."));
    let commit = StructSchema::new("Commit")
        .description("Commit changes.")
        .field(FieldSchema::new("message", TypeDescriptor::string()))
        .field(
            FieldSchema::new("all", TypeDescriptor::boolean())
                .default(false)
                .help("Stage all tracked files first."),
        );

    let ty = StructSchema::new("Args")
        .description("A tiny version-control front end.")
        .field(FieldSchema::new(
            "cmd",
            TypeDescriptor::union(vec![checkout.into(), commit.into()]),
        ))
        .field(FieldSchema::new("dry_run", TypeDescriptor::boolean()).default(false))
        .into();

    let args = std::env::args().skip(1);
    match cli_as::<Args, _, _>(&ty, None, args) {
        Ok(Args { cmd, dry_run }) => {
            let prefix = if dry_run { "[dry run] " } else { "" };
            match cmd {
                Action::Checkout { branch } => println!("{prefix}checking out {branch}"),
                Action::Commit { message, all } => {
                    println!("{prefix}committing {message:?} (all tracked files: {all})")
                }
            }
        }
        Err(err) => err.exit(),
    }
}
