use argschema::{
    Cli, CliError, FieldSchema, SchemaDocument, StructSchema, TypeDescriptor, Value, from_yaml,
    to_yaml,
};
use clap::error::ErrorKind;

const SERVE: &str = r#"
version: "1"
program:
  prog: serve
  about: Start a server.
root: Args
types:
  Color:
    enum: [RED, GREEN, BLUE]
  HTTPServer:
    fields:
      - { name: port, type: int, default: 8080, help: Port to bind. }
  SMTPServer:
    fields:
      - { name: relay, type: str }
  Args:
    fields:
      - { name: color, type: "optional[Color]", default: null }
      - { name: files, type: "list[path]", markers: [positional] }
      - { name: backend, type: "union[HTTPServer, SMTPServer]" }
default: !Args
  color: null
  files: !missing
  backend: !HTTPServer
    port: 9000
"#;

fn serve() -> Cli {
    let compiled = SchemaDocument::from_yaml_str(SERVE).unwrap().compile().unwrap();
    Cli::from_schema(compiled).unwrap()
}

#[test]
fn document_describes_a_complete_parser() {
    let cli = serve();
    assert_eq!(cli.config().prog, "serve");
    assert!(cli.render_help().contains("Start a server."));

    let value = cli.parse_from(["a.txt", "--color", "RED"]).unwrap();
    assert_eq!(value.attribute("color"), Some(&Value::enumeration("Color", "RED")));
    assert_eq!(
        value.attribute("backend").unwrap().attribute("port"),
        Some(&Value::Int(9000))
    );

    let value = cli
        .parse_from(["a.txt", "backend:smtp-server", "--backend.relay", "mx"])
        .unwrap();
    assert_eq!(
        value.attribute("backend").unwrap().attribute("relay"),
        Some(&Value::from("mx"))
    );
}

#[test]
fn missing_marker_in_document_default_keeps_field_required() {
    match serve().parse_from(Vec::<String>::new()) {
        Err(CliError::Usage(err)) => assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn parsed_values_round_trip_through_yaml() {
    let compiled = SchemaDocument::from_yaml_str(SERVE).unwrap().compile().unwrap();
    let root = compiled.root.clone();
    let cli = Cli::from_schema(compiled).unwrap();

    let value = cli
        .parse_from(["a.txt", "b.txt", "backend:smtp-server", "--backend.relay", "mx"])
        .unwrap();
    let text = to_yaml(&value).unwrap();
    assert!(text.contains("!SMTPServer"), "{text}");
    assert_eq!(from_yaml(&root, &text).unwrap(), value);
}

#[test]
fn yaml_default_feeds_a_builder() {
    let ty: TypeDescriptor = StructSchema::new("Job")
        .field(FieldSchema::new("name", TypeDescriptor::string()))
        .field(FieldSchema::new("retries", TypeDescriptor::int()))
        .into();
    let default = from_yaml(&ty, "!Job\nname: nightly\nretries: 2\n").unwrap();
    let cli = Cli::builder(ty).default(default).build().unwrap();

    let value = cli.parse_from(["--retries", "5"]).unwrap();
    assert_eq!(value.attribute("name"), Some(&Value::from("nightly")));
    assert_eq!(value.attribute("retries"), Some(&Value::Int(5)));
}

#[test]
fn invalid_document_is_a_schema_error() {
    let document = SchemaDocument::from_yaml_str("root: Missing\n").unwrap();
    let err = document.compile().unwrap_err();
    assert!(!err.is_usage());
    assert!(err.to_string().contains("Missing"), "{err}");
}
