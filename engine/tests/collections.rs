use argschema::{Cli, CliError, FieldSchema, StructSchema, StructValue, TypeDescriptor, Value};
use clap::error::ErrorKind;

fn single(name: &str, field: FieldSchema) -> Cli {
    Cli::builder(StructSchema::new(name).field(field)).build().unwrap()
}

fn usage_kind(result: Result<Value, CliError>) -> ErrorKind {
    match result {
        Err(CliError::Usage(err)) => err.kind(),
        other => panic!("expected a usage error, got {other:?}"),
    }
}

fn strs(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

// ---------------------------------------------------------------------------
// Sequences and tuples
// ---------------------------------------------------------------------------

#[test]
fn list_takes_one_or_more_tokens() {
    let cli = single("A", FieldSchema::new("xs", TypeDescriptor::list(TypeDescriptor::int())));
    let value = cli.parse_from(["--xs", "1", "2", "-3"]).unwrap();
    assert_eq!(
        value.attribute("xs"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(-3)]))
    );
    assert_eq!(usage_kind(cli.parse_from(["--xs"])), ErrorKind::InvalidValue);
}

#[test]
fn list_default_is_replaced_not_extended() {
    let cli = single(
        "A",
        FieldSchema::new("words", TypeDescriptor::list(TypeDescriptor::string()))
            .default(strs(&["a", "b"])),
    );
    assert_eq!(
        cli.parse_from(Vec::<String>::new()).unwrap().attribute("words"),
        Some(&strs(&["a", "b"]))
    );
    assert_eq!(
        cli.parse_from(["--words", "c"]).unwrap().attribute("words"),
        Some(&strs(&["c"]))
    );
}

#[test]
fn repeated_flag_keeps_the_last_occurrence() {
    let cli = single("A", FieldSchema::new("x", TypeDescriptor::int()));
    let value = cli.parse_from(["--x", "1", "--x", "2"]).unwrap();
    assert_eq!(value.attribute("x"), Some(&Value::Int(2)));
}

#[test]
fn fixed_tuple_takes_exact_count() {
    let cli = single(
        "A",
        FieldSchema::new(
            "pair",
            TypeDescriptor::tuple(vec![TypeDescriptor::int(), TypeDescriptor::string()]),
        ),
    );
    let value = cli.parse_from(["--pair", "1", "one"]).unwrap();
    assert_eq!(
        value.attribute("pair"),
        Some(&Value::Tuple(vec![Value::Int(1), Value::from("one")]))
    );
    assert!(cli.parse_from(["--pair", "1"]).is_err());
}

#[test]
fn variable_tuple_of_tuples() {
    let cli = single(
        "A",
        FieldSchema::new(
            "points",
            TypeDescriptor::var_tuple(TypeDescriptor::tuple(vec![
                TypeDescriptor::int(),
                TypeDescriptor::int(),
            ])),
        ),
    );
    let value = cli.parse_from(["--points", "1", "2", "3", "4"]).unwrap();
    assert_eq!(
        value.attribute("points"),
        Some(&Value::Tuple(vec![
            Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
            Value::Tuple(vec![Value::Int(3), Value::Int(4)]),
        ]))
    );
    assert_eq!(
        usage_kind(cli.parse_from(["--points", "1", "2", "3"])),
        ErrorKind::ValueValidation
    );
}

#[test]
fn tuple_containing_structs_is_expanded() {
    let server = StructSchema::new("Server").field(FieldSchema::new("port", TypeDescriptor::int()));
    let cli = single(
        "A",
        FieldSchema::new(
            "x",
            TypeDescriptor::tuple(vec![server.into(), TypeDescriptor::float()]),
        ),
    );
    let value = cli.parse_from(["--x.0.port", "80", "--x.1", "2.5"]).unwrap();
    assert_eq!(
        value.attribute("x"),
        Some(&Value::Tuple(vec![
            Value::Struct(StructValue::new("Server").with("port", 80)),
            Value::Float(2.5),
        ]))
    );
}

#[test]
fn every_slot_of_a_struct_tuple_is_required() {
    let channel = StructSchema::new("Channel").field(FieldSchema::new("r", TypeDescriptor::int()));
    let cli = single(
        "A",
        FieldSchema::new(
            "x",
            TypeDescriptor::tuple(vec![
                channel.clone().into(),
                channel.into(),
                TypeDescriptor::float(),
            ]),
        ),
    );

    assert_eq!(
        usage_kind(cli.parse_from(["--x.0.r", "1", "--x.2", "2.5"])),
        ErrorKind::MissingRequiredArgument
    );

    let value = cli
        .parse_from(["--x.0.r", "1", "--x.1.r", "2", "--x.2", "2.5"])
        .unwrap();
    assert_eq!(
        value.attribute("x"),
        Some(&Value::Tuple(vec![
            Value::Struct(StructValue::new("Channel").with("r", 1)),
            Value::Struct(StructValue::new("Channel").with("r", 2)),
            Value::Float(2.5),
        ]))
    );
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

#[test]
fn mapping_without_default_takes_key_value_pairs() {
    let cli = single(
        "A",
        FieldSchema::new(
            "env",
            TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::int()),
        ),
    );
    let value = cli.parse_from(["--env", "a", "1", "b", "2"]).unwrap();
    assert_eq!(
        value.attribute("env"),
        Some(&Value::Map(vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2)),
        ]))
    );

    let err = match cli.parse_from(["--env", "a", "1", "b"]) {
        Err(CliError::Usage(err)) => err,
        other => panic!("unexpected result {other:?}"),
    };
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
    assert!(err.to_string().contains("incomplete set of key value pairs"));
}

#[test]
fn mapping_with_default_gets_one_flag_per_key() {
    let default = Value::Map(vec![
        (Value::from("num_epochs"), Value::Float(20.0)),
        (Value::from("lr"), Value::Float(0.1)),
    ]);
    let cli = single(
        "A",
        FieldSchema::new(
            "params",
            TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::float()),
        )
        .default(default),
    );
    let value = cli.parse_from(["--params.num-epochs", "5"]).unwrap();
    assert_eq!(
        value.attribute("params"),
        Some(&Value::Map(vec![
            (Value::from("num_epochs"), Value::Float(5.0)),
            (Value::from("lr"), Value::Float(0.1)),
        ]))
    );
}

#[test]
fn mapping_keys_with_one_flag_spelling_keep_the_pair_form() {
    let default = Value::Map(vec![
        (Value::from("a_b"), Value::Int(1)),
        (Value::from("a-b"), Value::Int(2)),
    ]);
    let cli = single(
        "A",
        FieldSchema::new(
            "params",
            TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::int()),
        )
        .default(default.clone()),
    );
    let value = cli.parse_from(Vec::<String>::new()).unwrap();
    assert_eq!(value.attribute("params"), Some(&default));

    let value = cli.parse_from(["--params", "a_b", "7"]).unwrap();
    assert_eq!(
        value.attribute("params"),
        Some(&Value::Map(vec![(Value::from("a_b"), Value::Int(7))]))
    );
}

// ---------------------------------------------------------------------------
// Choices, optionals and booleans
// ---------------------------------------------------------------------------

fn color() -> TypeDescriptor {
    TypeDescriptor::enumeration("Color", ["RED", "GREEN", "BLUE"])
}

#[test]
fn enum_members_are_choices() {
    let cli = single("A", FieldSchema::new("color", color()));
    let value = cli.parse_from(["--color", "GREEN"]).unwrap();
    assert_eq!(value.attribute("color"), Some(&Value::enumeration("Color", "GREEN")));
    assert_eq!(
        usage_kind(cli.parse_from(["--color", "PURPLE"])),
        ErrorKind::InvalidValue
    );
}

#[test]
fn relaxed_choices_are_still_checked_by_the_instantiator() {
    let cli = Cli::builder(StructSchema::new("A").field(FieldSchema::new("color", color())))
        .strict_choices(false)
        .build()
        .unwrap();
    assert_eq!(
        usage_kind(cli.parse_from(["--color", "PURPLE"])),
        ErrorKind::ValueValidation
    );
}

#[test]
fn literal_values_keep_their_type() {
    let cli = single(
        "A",
        FieldSchema::new(
            "level",
            TypeDescriptor::literal(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ),
    );
    let value = cli.parse_from(["--level", "2"]).unwrap();
    assert_eq!(value.attribute("level"), Some(&Value::Int(2)));
    assert!(cli.parse_from(["--level", "4"]).is_err());
}

#[test]
fn optional_scalar_accepts_none() {
    let cli = single(
        "A",
        FieldSchema::new("limit", TypeDescriptor::optional(TypeDescriptor::int())).default(Value::None),
    );
    assert_eq!(
        cli.parse_from(Vec::<String>::new()).unwrap().attribute("limit"),
        Some(&Value::None)
    );
    assert_eq!(
        cli.parse_from(["--limit", "5"]).unwrap().attribute("limit"),
        Some(&Value::Int(5))
    );
    assert_eq!(
        cli.parse_from(["--limit", "None"]).unwrap().attribute("limit"),
        Some(&Value::None)
    );
}

#[test]
fn boolean_flags_follow_their_default() {
    let schema = StructSchema::new("A")
        .field(FieldSchema::new("debug", TypeDescriptor::boolean()).default(false))
        .field(FieldSchema::new("use_cache", TypeDescriptor::boolean()).default(true))
        .field(FieldSchema::new("confirm", TypeDescriptor::boolean()));
    let cli = Cli::builder(schema).build().unwrap();

    let value = cli
        .parse_from(["--debug", "--no-use-cache", "--confirm", "True"])
        .unwrap();
    assert_eq!(
        value,
        Value::Struct(
            StructValue::new("A")
                .with("debug", true)
                .with("use_cache", false)
                .with("confirm", true)
        )
    );

    let value = cli.parse_from(["--confirm", "False"]).unwrap();
    assert_eq!(value.attribute("debug"), Some(&Value::Bool(false)));
    assert_eq!(value.attribute("use_cache"), Some(&Value::Bool(true)));
    assert_eq!(
        usage_kind(cli.parse_from(["--confirm", "yes"])),
        ErrorKind::InvalidValue
    );
}
