//! Typed command-line interfaces from schemas.
//!
//! A [`TypeDescriptor`] (usually a struct built with [`StructSchema`]) is
//! resolved and lowered into a clap command once, up front. Parsing hands the
//! raw tokens back to the instantiators, fills in defaults and returns a typed
//! [`Value`], or deserializes it into a serde type with [`cli_as`].
//!
//! Unions of structs become subcommands named `path:variant`; nested structs
//! become dotted flags such as `--child-struct.arg-name`.
//!
//! # Example
//!
//! ```
//! use argschema::{Cli, FieldSchema, StructSchema, TypeDescriptor, Value};
//!
//! let schema = StructSchema::new("Args")
//!     .description("Resize an image")
//!     .field(FieldSchema::new("width", TypeDescriptor::int()).help("Target width"))
//!     .field(FieldSchema::new("keep_ratio", TypeDescriptor::boolean()).default(false));
//!
//! let cli = Cli::builder(schema).prog("resize").build().unwrap();
//! let value = cli.parse_from(["--width", "640", "--keep-ratio"]).unwrap();
//! assert_eq!(value.attribute("width"), Some(&Value::Int(640)));
//! assert_eq!(value.attribute("keep_ratio"), Some(&Value::Bool(true)));
//! assert!(cli.render_help().contains("Target width (required)"));
//! ```

mod assemble;
mod dispatch;
mod error;
mod parser;

use argschema_core::{NameRegistry, resolve};
pub use argschema_core::{
    Arity, ArgumentSummary, CompiledSchema, Error, FieldDefault, FieldNode, FieldSchema, FlagAction,
    Marker, ParseError, ParserConfig, ScalarKind, SchemaDocument, StructSchema, StructValue,
    TypeDescriptor, ValidationError, Value, from_yaml, to_yaml, validate_document, validate_struct,
};
use clap::Command;
use clap::error::{ContextKind, ContextValue, ErrorKind};
pub use dispatch::LoweredSummary;
pub use error::CliError;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::assemble::assemble;
use crate::dispatch::{Layout, Namespace, ParserSpec};

/// A lowered schema, ready to parse arguments.
///
/// Building a `Cli` resolves the schema and lowers every argument, so schema
/// errors surface from [`CliBuilder::build`] before any argument is read.
#[derive(Debug, Clone)]
pub struct Cli {
    root: FieldNode,
    spec: ParserSpec,
    command: Command,
    registry: NameRegistry,
    config: ParserConfig,
}

/// Builder for [`Cli`].
#[derive(Debug, Clone)]
pub struct CliBuilder {
    ty: TypeDescriptor,
    default: FieldDefault,
    config: ParserConfig,
}

impl CliBuilder {
    pub fn new(ty: impl Into<TypeDescriptor>) -> Self {
        Self {
            ty: ty.into(),
            default: FieldDefault::Unset,
            config: ParserConfig::default(),
        }
    }

    /// Sets the default instance of the root.
    ///
    /// Fields missing from it, or set to [`Value::Missing`], stay required.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Sets the root default as a [`FieldDefault`].
    pub fn field_default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    /// Replaces the whole parser configuration.
    pub fn config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn prog(mut self, prog: impl Into<String>) -> Self {
        self.config.prog = prog.into();
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.config.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn strict_choices(mut self, strict: bool) -> Self {
        self.config.strict_choices = strict;
        self
    }

    /// Resolves and lowers the schema.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Schema`] when a type cannot be lowered or the
    /// resulting arguments cannot be parsed unambiguously.
    pub fn build(self) -> Result<Cli, CliError> {
        let root = resolve(&self.ty, self.default)?;

        let mut reserved = vec!["--help"];
        if self.config.version.is_some() {
            reserved.push("--version");
        }
        let mut registry = NameRegistry::default();
        let spec = ParserSpec::build(
            &root,
            &self.config.prog,
            &mut Layout {
                reserved: &reserved,
                registry: &mut registry,
            },
        )?;

        let mut command = spec.to_command(self.config.strict_choices);
        if let Some(about) = &self.config.about {
            command = command.about(about.clone());
        }
        if let Some(version) = &self.config.version {
            command = command.version(version.clone());
        }
        command.build();

        debug!(
            prog = %self.config.prog,
            arguments = spec.argument_count(),
            subcommands = command.get_subcommands().count(),
            "lowered schema"
        );
        Ok(Cli {
            root,
            spec,
            command,
            registry,
            config: self.config,
        })
    }
}

impl Cli {
    pub fn builder(ty: impl Into<TypeDescriptor>) -> CliBuilder {
        CliBuilder::new(ty)
    }

    /// Builds the parser described by a compiled schema document.
    pub fn from_schema(schema: CompiledSchema) -> Result<Self, CliError> {
        CliBuilder::new(schema.root)
            .field_default(schema.default)
            .config(schema.config)
            .build()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses `args` (without the program name) into a value.
    ///
    /// Flag and selector spellings may mix `-` and `_`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Usage`] for anything wrong with the arguments,
    /// including requests for help.
    pub fn parse_from<I, S>(&self, args: I) -> Result<Value, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self.registry.canonicalize(args);
        let mut command = self.command.clone();
        let matches = command
            .try_get_matches_from_mut(std::iter::once(self.config.prog.clone()).chain(args))
            .map_err(|err| self.classify(err, &mut command))?;

        let mut namespace = Namespace::default();
        self.spec.read_matches(&matches, &mut namespace)?;
        let value = assemble(&self.root, &mut namespace).map_err(|err| usage_error(err, &mut command))?;
        value.ok_or_else(|| Error::Invariant("the root value was left out of construction".into()).into())
    }

    /// Parses the process arguments, exiting with a message on error.
    pub fn parse(&self) -> Value {
        let args = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned());
        match self.parse_from(args) {
            Ok(value) => value,
            Err(err) => err.exit(),
        }
    }

    /// Plain-text help of the root command.
    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Every parser scope with its lowered arguments.
    pub fn lowered(&self) -> LoweredSummary {
        let mut summary = self.spec.summary();
        if let Some(about) = &self.config.about {
            summary.description = Some(about.clone());
        }
        summary
    }

    /// Turns clap's unknown-argument error into a wrong-variant error when
    /// the flag belongs to a variant that was not selected.
    fn classify(&self, err: clap::Error, command: &mut Command) -> CliError {
        if err.kind() == ErrorKind::UnknownArgument {
            if let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg) {
                let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
                let owners = self.registry.owners(flag);
                if !owners.is_empty() {
                    return usage_error(
                        Error::WrongVariantField {
                            flag: flag.to_string(),
                            owners: owners.to_vec(),
                        },
                        command,
                    );
                }
            }
        }
        CliError::Usage(err)
    }
}

/// Renders user-facing core errors the way clap renders its own.
fn usage_error(err: Error, command: &mut Command) -> CliError {
    let kind = match &err {
        Error::Parse { .. } => ErrorKind::ValueValidation,
        Error::MissingSubcommand { .. } => ErrorKind::MissingSubcommand,
        Error::WrongVariantField { .. } => ErrorKind::UnknownArgument,
        Error::MissingArgument { .. } => ErrorKind::MissingRequiredArgument,
        _ => return CliError::Schema(err),
    };
    CliError::Usage(command.error(kind, err))
}

/// Parses `args` against `ty` in one step.
///
/// ```
/// use argschema::{FieldSchema, StructSchema, StructValue, TypeDescriptor, Value, cli};
///
/// let ty = StructSchema::new("Args")
///     .field(FieldSchema::new("x", TypeDescriptor::int()))
///     .into();
/// let value = cli(&ty, None, ["--x", "3"]).unwrap();
/// assert_eq!(value, Value::Struct(StructValue::new("Args").with("x", 3)));
/// ```
pub fn cli<I, S>(ty: &TypeDescriptor, default: Option<Value>, args: I) -> Result<Value, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut builder = CliBuilder::new(ty.clone());
    if let Some(default) = default {
        builder = builder.default(default);
    }
    builder.build()?.parse_from(args)
}

/// Parses `args` against `ty` and deserializes the result into `T`.
///
/// ```
/// use argschema::{FieldSchema, StructSchema, TypeDescriptor, cli_as};
///
/// #[derive(serde::Deserialize)]
/// struct Args {
///     name: String,
///     retries: i64,
/// }
///
/// let ty = StructSchema::new("Args")
///     .field(FieldSchema::new("name", TypeDescriptor::string()))
///     .field(FieldSchema::new("retries", TypeDescriptor::int()).default(3))
///     .into();
/// let args: Args = cli_as(&ty, None, ["--name", "job"]).unwrap();
/// assert_eq!(args.name, "job");
/// assert_eq!(args.retries, 3);
/// ```
pub fn cli_as<T, I, S>(ty: &TypeDescriptor, default: Option<Value>, args: I) -> Result<T, CliError>
where
    T: DeserializeOwned,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(cli(ty, default, args)?.deserialize_into()?)
}
