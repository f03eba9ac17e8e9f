//! Generic struct example.
//!
//! One generic declaration applied to two type arguments yields two
//! subcommands whose fields parse different scalar types.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p argschema-demos --example generics -- point-int --x 1 --y 2
//! cargo run -p argschema-demos --example generics -- point-float --x 0.5 --y 1.5
//! ```

use std::sync::Arc;

use argschema::{Cli, FieldSchema, StructSchema, TypeDescriptor};

fn main() {
    let point = Arc::new(
        StructSchema::new("Point")
            .description("A point in the plane.")
            .type_params(["T"])
            .field(FieldSchema::new("x", TypeDescriptor::type_var("T")))
            .field(FieldSchema::new("y", TypeDescriptor::type_var("T"))),
    );
    let ty = TypeDescriptor::union(vec![
        TypeDescriptor::generic(point.clone(), vec![TypeDescriptor::int()]),
        TypeDescriptor::generic(point, vec![TypeDescriptor::float()]),
    ]);

    let cli = match Cli::builder(ty)
        .prog("generics")
        .about("Print a point.")
        .build()
    {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    argschema_demos::run(&cli);
}
