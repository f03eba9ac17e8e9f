use std::sync::Arc;

use argschema::{Cli, CliError, FieldSchema, StructSchema, StructValue, TypeDescriptor, Value};

fn command() -> Arc<StructSchema> {
    Arc::new(
        StructSchema::new("Command")
            .type_params(["T"])
            .field(FieldSchema::new("value", TypeDescriptor::type_var("T")))
            .field(FieldSchema::new("extra", TypeDescriptor::list(TypeDescriptor::type_var("T"))).default(Value::List(vec![]))),
    )
}

#[test]
fn type_parameters_bind_field_types() {
    let ty = TypeDescriptor::generic(command(), vec![TypeDescriptor::int()]);
    let cli = Cli::builder(StructSchema::new("Root").field(FieldSchema::new("cmd", ty)))
        .build()
        .unwrap();
    let value = cli
        .parse_from(["--cmd.value", "3", "--cmd.extra", "4", "5"])
        .unwrap();
    assert_eq!(
        value.attribute("cmd"),
        Some(&Value::Struct(
            StructValue::new("Command")
                .with("value", 3)
                .with("extra", Value::List(vec![Value::Int(4), Value::Int(5)]))
        ))
    );
    assert!(cli.render_help().contains("--cmd.value <INT>"));
}

#[test]
fn applied_generics_get_distinct_subcommands() {
    let ty = TypeDescriptor::union(vec![
        TypeDescriptor::generic(command(), vec![TypeDescriptor::int()]),
        TypeDescriptor::generic(command(), vec![TypeDescriptor::float()]),
    ]);
    let cli = Cli::builder(ty).build().unwrap();

    let value = cli.parse_from(["command-float", "--value", "2.5"]).unwrap();
    assert_eq!(value.attribute("value"), Some(&Value::Float(2.5)));

    let value = cli.parse_from(["command-int", "--value", "2"]).unwrap();
    assert_eq!(value.attribute("value"), Some(&Value::Int(2)));
    assert!(cli.parse_from(["command-int", "--value", "2.5"]).is_err());
}

#[test]
fn parameters_flow_into_nested_generics() {
    let wrapper = Arc::new(
        StructSchema::new("Wrapper")
            .type_params(["U"])
            .field(FieldSchema::new(
                "inner",
                TypeDescriptor::generic(command(), vec![TypeDescriptor::type_var("U")]),
            )),
    );
    let ty = TypeDescriptor::generic(wrapper, vec![TypeDescriptor::string()]);
    let cli = Cli::builder(ty).build().unwrap();
    let value = cli.parse_from(["--inner.value", "hello"]).unwrap();
    assert_eq!(
        value.attribute("inner").unwrap().attribute("value"),
        Some(&Value::from("hello"))
    );
}

#[test]
fn unbound_type_parameter_fails_to_build() {
    let ty = TypeDescriptor::from(command());
    match Cli::builder(ty).build() {
        Err(CliError::Schema(argschema::Error::Schema { path, message })) => {
            assert_eq!(path, "value");
            assert!(message.contains("`T`"), "{message}");
        }
        other => panic!("unexpected result {other:?}"),
    }
}
