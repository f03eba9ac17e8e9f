//! Collection example.
//!
//! Lists, tuples, mappings, enums, literals and optional values, each lowered
//! to a single flag with a matching arity.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p argschema-demos --example collections -- --help
//! cargo run -p argschema-demos --example collections -- \
//!     --inputs a.csv b.csv --shape 3 4 --labels cat 0 dog 1 --mode fast
//! ```

use argschema::{Cli, FieldSchema, StructSchema, TypeDescriptor, Value};

fn main() {
    let schema = StructSchema::new("Job")
        .description("Process a batch of files.")
        .field(
            FieldSchema::new("inputs", TypeDescriptor::list(TypeDescriptor::path()))
                .help("Files to read."),
        )
        .field(
            FieldSchema::new(
                "shape",
                TypeDescriptor::tuple(vec![TypeDescriptor::int(), TypeDescriptor::int()]),
            )
            .default(Value::Tuple(vec![Value::Int(1), Value::Int(1)]))
            .help("Rows and columns."),
        )
        .field(
            FieldSchema::new(
                "labels",
                TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::int()),
            )
            .default(Value::Map(Vec::new()))
            .help("Label name to class index."),
        )
        .field(
            FieldSchema::new(
                "color",
                TypeDescriptor::enumeration("Color", ["RED", "GREEN", "BLUE"]),
            )
            .default(Value::enumeration("Color", "RED")),
        )
        .field(
            FieldSchema::new(
                "mode",
                TypeDescriptor::literal(vec![Value::from("fast"), Value::from("slow")]),
            )
            .default("slow"),
        )
        .field(
            FieldSchema::new("limit", TypeDescriptor::optional(TypeDescriptor::int()))
                .default(Value::None)
                .help("Stop after this many rows."),
        );

    let cli = match Cli::builder(schema).prog("collections").build() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    argschema_demos::run(&cli);
}
