//! Nested struct example.
//!
//! Builds a training configuration whose nested optimizer struct becomes a
//! group of dotted flags, and whose post-construction hook derives a field
//! from the parsed ones.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p argschema-demos --example nested_config -- --help
//! cargo run -p argschema-demos --example nested_config -- \
//!     --optimizer.learning-rate 0.01 --optimizer.algorithm SGD --num-epochs 3
//! ```

use argschema::{Cli, FieldSchema, StructSchema, StructValue, TypeDescriptor, Value};

/// Total steps are derived once the epoch and batch counts are known.
fn total_steps(config: &mut StructValue) {
    if let (Some(Value::Int(epochs)), Some(Value::Int(batches))) =
        (config.get("num_epochs"), config.get("batches_per_epoch"))
    {
        let steps = epochs * batches;
        config.set("total_steps", steps);
    }
}

fn main() {
    let optimizer = StructSchema::new("OptimizerConfig")
        .description("Optimizer settings.")
        .field(
            FieldSchema::new(
                "algorithm",
                TypeDescriptor::enumeration("Algorithm", ["ADAM", "SGD"]),
            )
            .default(Value::enumeration("Algorithm", "ADAM"))
            .help("Gradient-based optimizer to use."),
        )
        .field(
            FieldSchema::new("learning_rate", TypeDescriptor::float())
                .default(3e-4)
                .help("Learning rate to use."),
        )
        .field(
            FieldSchema::new("weight_decay", TypeDescriptor::float())
                .default(1e-2)
                .help("Coefficient for L2 regularization."),
        );

    let config = StructSchema::new("ExperimentConfig")
        .description("Train a model.")
        .field(FieldSchema::new("optimizer", optimizer))
        .field(
            FieldSchema::new("num_epochs", TypeDescriptor::int())
                .default(10)
                .help("Passes over the dataset."),
        )
        .field(FieldSchema::new("batches_per_epoch", TypeDescriptor::int()).default(100))
        .field(
            FieldSchema::new("seed", TypeDescriptor::int())
                .default(0)
                .help("Random seed. This is helpful for making sure that our experiments are all 100% reproducible!"),
        )
        .post_init(total_steps);

    let cli = match Cli::builder(config).prog("nested_config").build() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    argschema_demos::run(&cli);
}
