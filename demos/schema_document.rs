//! Schema document example.
//!
//! Describes a parser entirely in YAML, including a default instance, and
//! writes the parsed value back as YAML.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p argschema-demos --example schema_document -- --help
//! cargo run -p argschema-demos --example schema_document -- report.pdf \
//!     backend:smtp-server --backend.relay mail.example.com
//! ```

use argschema::{Cli, SchemaDocument, to_yaml};

const DOCUMENT: &str = r#"
version: "1"
program:
  prog: schema_document
  about: Send files through a backend.
  version: "1.0.0"
root: Args
types:
  HTTPServer:
    description: Upload over HTTP.
    fields:
      - { name: port, type: int, default: 8080, help: Port to connect to. }
  SMTPServer:
    description: Send as mail attachments.
    fields:
      - { name: relay, type: str, help: Mail relay host. }
  Args:
    fields:
      - { name: files, type: "list[path]", markers: [positional] }
      - { name: retries, type: int, default: 3 }
      - { name: backend, type: "union[HTTPServer, SMTPServer]" }
default: !Args
  files: !missing
  retries: 3
  backend: !HTTPServer
    port: 443
"#;

fn main() {
    let compiled = match SchemaDocument::from_yaml_str(DOCUMENT).and_then(|doc| doc.compile()) {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let cli = match Cli::from_schema(compiled) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let value = cli.parse();
    match to_yaml(&value) {
        Ok(yaml) => print!("{yaml}"),
        Err(err) => eprintln!("error: {err}"),
    }
}
