//! Argument lowering pipeline.
//!
//! Each leaf [`ArgumentDefinition`] is lowered into a
//! [`LoweredArgumentDefinition`] by folding an ordered list of named rules
//! over an initially empty record. Every rule receives the previous record by
//! value and returns a new one built with struct-update syntax, so each stage
//! can be inspected and tested on its own:
//!
//! 1. `handle_defaults`: required-ness from the default.
//! 2. `handle_boolean_flags`: store-true/store-false polarity.
//! 3. `synthesize_instantiator`: instantiator and metadata, or a fixed field.
//! 4. `stringify_defaults`: default tokens for help display.
//! 5. `generate_helptext`: documentation plus default/required annotation.
//! 6. `set_name_or_flag`: dotted flag name and destination.
//! 7. `finalize_positional`: positional arity and placeholder.
//!
//! Typed defaults never leave this module as live values; the flag parser
//! only sees tokens, and the assembler substitutes the stored default.

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::instantiators::{Arity, Instantiator, instantiator_from_type};
use crate::resolver::FieldDefinition;
use crate::strings::{MISSING_PLACEHOLDER, escape_percent, make_field_name, shell_quote};
use crate::types::{FieldDefault, Marker, ScalarKind, Substitutions, TypeDescriptor};
use crate::value::Value;

/// A leaf field together with its location and type bindings.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    /// Raw dotted path of the parent.
    pub prefix: String,
    pub field: FieldDefinition,
    pub type_from_typevar: Substitutions,
}

impl ArgumentDefinition {
    /// Canonical dotted path, also the key of the parsed namespace.
    pub fn dest(&self) -> String {
        make_field_name([self.prefix.as_str(), self.field.name.as_str()])
    }

    pub fn is_positional(&self) -> bool {
        self.field.has_marker(Marker::Positional)
    }

    fn resolved_type(&self) -> Option<TypeDescriptor> {
        self.field.ty.substitute(&self.type_from_typevar).ok()
    }

    /// Runs every lowering rule in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::*;
    ///
    /// let schema = StructSchema::new("Args")
    ///     .field(FieldSchema::new("verbose", TypeDescriptor::boolean()).default(true));
    /// let FieldNode::Nested(root) = resolve(&schema.into(), FieldDefault::Unset).unwrap() else {
    ///     unreachable!()
    /// };
    /// let FieldNode::Leaf(arg) = &root.tree.children[0] else { unreachable!() };
    ///
    /// let lowered = arg.lower().unwrap();
    /// assert_eq!(lowered.name_or_flag, "--no-verbose");
    /// assert_eq!(lowered.action, FlagAction::StoreFalse);
    /// ```
    pub fn lower(&self) -> Result<LoweredArgumentDefinition> {
        LOWERING_RULES
            .iter()
            .try_fold(LoweredArgumentDefinition::default(), |lowered, (name, rule)| {
                trace!(rule = name, dest = %self.dest(), "applying lowering rule");
                rule(self, lowered)
            })
    }
}

/// How the parser stores a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagAction {
    /// Consume tokens.
    #[default]
    Store,
    StoreTrue,
    StoreFalse,
}

/// Tokens accepted by the parser for one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedValues {
    pub tokens: Vec<String>,
    /// Also accept [`MISSING_PLACEHOLDER`]; only set for optional positionals.
    pub accept_placeholder: bool,
}

impl AllowedValues {
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
            || (self.accept_placeholder && token == MISSING_PLACEHOLDER)
    }
}

/// Rendered help, or a marker hiding the argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HelpText {
    /// Help with literal `%` escaped as `%%`.
    Visible(String),
    Suppressed,
}

/// Default as seen by the lowering pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoweredDefault {
    #[default]
    Absent,
    /// The field is omitted from construction unless supplied.
    Excluded,
    /// Token spelling of a concrete default, for display only.
    Tokens(Vec<String>),
}

/// A flag definition ready to be registered with the parser.
#[derive(Debug, Clone, Default)]
pub struct LoweredArgumentDefinition {
    /// `None` marks a fixed argument.
    pub instantiator: Option<Instantiator>,
    pub name_or_flag: String,
    /// Not set for positionals.
    pub dest: Option<String>,
    /// Not set for positionals; implied by their arity.
    pub required: Option<bool>,
    pub action: FlagAction,
    pub nargs: Option<Arity>,
    pub choices: Option<AllowedValues>,
    pub metavar: Option<String>,
    pub help: Option<HelpText>,
    pub default: LoweredDefault,
}

impl LoweredArgumentDefinition {
    pub fn is_fixed(&self) -> bool {
        self.instantiator.is_none()
    }

    pub fn is_positional(&self) -> bool {
        !self.name_or_flag.starts_with("--")
    }

    /// Whether the parser must see this argument.
    pub fn is_required(&self) -> bool {
        if self.is_positional() {
            !self.is_fixed() && !matches!(self.nargs, Some(Arity::ZeroOrOne | Arity::All))
        } else {
            self.required.unwrap_or(false)
        }
    }
}

type LoweringRule = fn(&ArgumentDefinition, LoweredArgumentDefinition) -> Result<LoweredArgumentDefinition>;

const LOWERING_RULES: [(&str, LoweringRule); 7] = [
    ("handle_defaults", handle_defaults),
    ("handle_boolean_flags", handle_boolean_flags),
    ("synthesize_instantiator", synthesize_instantiator),
    ("stringify_defaults", stringify_defaults),
    ("generate_helptext", generate_helptext),
    ("set_name_or_flag", set_name_or_flag),
    ("finalize_positional", finalize_positional),
];

fn handle_defaults(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    let (required, default) = match &arg.field.default {
        FieldDefault::Unset | FieldDefault::PropagatedMissing => (true, LoweredDefault::Absent),
        FieldDefault::ExcludeFromCall => (false, LoweredDefault::Excluded),
        FieldDefault::Value(_) => (false, LoweredDefault::Absent),
    };
    Ok(LoweredArgumentDefinition {
        required: Some(required),
        default,
        ..lowered
    })
}

fn handle_boolean_flags(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    let is_bool = matches!(
        arg.resolved_type(),
        Some(TypeDescriptor::Scalar(ScalarKind::Bool))
    );
    if !is_bool || arg.is_positional() || arg.field.has_marker(Marker::FlagConversionOff) {
        return Ok(lowered);
    }
    let action = match &arg.field.default {
        FieldDefault::Value(Value::Bool(false)) => FlagAction::StoreTrue,
        FieldDefault::Value(Value::Bool(true)) => FlagAction::StoreFalse,
        FieldDefault::Value(other) => {
            return Err(Error::schema(
                arg.dest(),
                format!("boolean field has a non-boolean default `{other}`"),
            ));
        }
        _ => return Ok(lowered),
    };
    Ok(LoweredArgumentDefinition {
        instantiator: Some(Instantiator::Flag),
        action,
        ..lowered
    })
}

fn fixed(lowered: LoweredArgumentDefinition) -> LoweredArgumentDefinition {
    LoweredArgumentDefinition {
        instantiator: None,
        action: FlagAction::Store,
        required: Some(false),
        nargs: None,
        choices: None,
        metavar: Some("{fixed}".to_string()),
        ..lowered
    }
}

fn synthesize_instantiator(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    if arg.field.has_marker(Marker::Fixed) {
        if !arg.field.default.is_present() {
            return Err(Error::unsupported(arg.dest(), "fixed fields need a default"));
        }
        return Ok(fixed(lowered));
    }
    if lowered.instantiator.is_some() {
        return Ok(lowered);
    }
    match instantiator_from_type(&arg.field.ty, &arg.type_from_typevar) {
        Ok((instantiator, meta)) => Ok(LoweredArgumentDefinition {
            instantiator: Some(instantiator),
            nargs: Some(meta.nargs),
            metavar: Some(meta.metavar),
            choices: meta.choices.map(|tokens| AllowedValues {
                tokens,
                accept_placeholder: false,
            }),
            ..lowered
        }),
        Err(err) if arg.field.default.is_present() => {
            debug!(dest = %arg.dest(), reason = %err, "no instantiator, field is fixed to its default");
            Ok(fixed(lowered))
        }
        Err(err) => Err(Error::unsupported(arg.dest(), err.0)),
    }
}

fn stringify_defaults(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    match (&arg.field.default, lowered.action) {
        (FieldDefault::Value(value), FlagAction::Store) => Ok(LoweredArgumentDefinition {
            default: LoweredDefault::Tokens(value.token_parts()),
            ..lowered
        }),
        _ => Ok(lowered),
    }
}

fn generate_helptext(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    if arg.field.has_marker(Marker::Suppress) {
        return Ok(LoweredArgumentDefinition {
            help: Some(HelpText::Suppressed),
            ..lowered
        });
    }

    let mut parts = Vec::new();
    if let Some(doc) = arg.field.help.as_deref().filter(|doc| !doc.is_empty()) {
        parts.push(escape_percent(doc));
    }
    let name = &arg.field.name;
    let annotation = if lowered.required == Some(true) {
        "(required)".to_string()
    } else if lowered.is_fixed() {
        let shown = match &arg.field.default {
            FieldDefault::Value(value) => value.to_string(),
            _ => "unset".to_string(),
        };
        format!("(fixed to: {shown})")
    } else if lowered.action == FlagAction::StoreTrue {
        format!("(sets: {name}=True)")
    } else if lowered.action == FlagAction::StoreFalse {
        format!("(sets: {name}=False)")
    } else if lowered.default == LoweredDefault::Excluded {
        "(unset by default)".to_string()
    } else if let LoweredDefault::Tokens(tokens) = &lowered.default {
        let quoted: Vec<String> = tokens.iter().map(|t| shell_quote(t)).collect();
        format!("(default: {})", quoted.join(" "))
    } else {
        String::new()
    };
    if !annotation.is_empty() {
        parts.push(escape_percent(&annotation));
    }

    Ok(LoweredArgumentDefinition {
        help: Some(HelpText::Visible(parts.join(" "))),
        ..lowered
    })
}

fn set_name_or_flag(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    let dest = arg.dest();
    let name_or_flag = if arg.is_positional() {
        dest.clone()
    } else if lowered.action == FlagAction::StoreFalse {
        let negated = format!("no_{}", arg.field.name);
        format!("--{}", make_field_name([arg.prefix.as_str(), negated.as_str()]))
    } else {
        format!("--{dest}")
    };
    Ok(LoweredArgumentDefinition {
        name_or_flag,
        dest: Some(dest),
        ..lowered
    })
}

fn finalize_positional(
    arg: &ArgumentDefinition,
    lowered: LoweredArgumentDefinition,
) -> Result<LoweredArgumentDefinition> {
    if !arg.is_positional() {
        return Ok(lowered);
    }
    if lowered.required == Some(true) {
        return Ok(LoweredArgumentDefinition {
            required: None,
            dest: None,
            ..lowered
        });
    }
    let nargs = match lowered.nargs {
        Some(Arity::Exactly(1)) => Arity::ZeroOrOne,
        _ => Arity::All,
    };
    Ok(LoweredArgumentDefinition {
        required: None,
        dest: None,
        nargs: Some(nargs),
        metavar: lowered.metavar.map(|m| format!("[{m}]")),
        choices: lowered.choices.map(|choices| AllowedValues {
            accept_placeholder: true,
            ..choices
        }),
        ..lowered
    })
}

/// Serializable view of a lowered argument, for inspection and tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentSummary {
    pub name_or_flag: String,
    pub required: bool,
    pub action: FlagAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nargs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metavar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub hidden: bool,
    pub fixed: bool,
}

impl From<&LoweredArgumentDefinition> for ArgumentSummary {
    fn from(lowered: &LoweredArgumentDefinition) -> Self {
        let (help, hidden) = match &lowered.help {
            Some(HelpText::Visible(text)) => (Some(text.replace("%%", "%")), false),
            Some(HelpText::Suppressed) => (None, true),
            None => (None, false),
        };
        Self {
            name_or_flag: lowered.name_or_flag.clone(),
            required: lowered.is_required(),
            action: lowered.action,
            nargs: lowered.nargs.map(|n| n.to_string()),
            metavar: lowered.metavar.clone(),
            choices: lowered.choices.as_ref().map(|c| c.tokens.clone()),
            help,
            hidden,
            fixed: lowered.is_fixed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::value::StructValue;

    fn arg(name: &str, ty: TypeDescriptor, default: FieldDefault) -> ArgumentDefinition {
        ArgumentDefinition {
            prefix: String::new(),
            field: FieldDefinition {
                name: name.to_string(),
                ty,
                default,
                help: None,
                markers: BTreeSet::new(),
            },
            type_from_typevar: Substitutions::new(),
        }
    }

    fn with_marker(mut arg: ArgumentDefinition, marker: Marker) -> ArgumentDefinition {
        arg.field.markers.insert(marker);
        arg
    }

    fn help_of(lowered: &LoweredArgumentDefinition) -> &str {
        match &lowered.help {
            Some(HelpText::Visible(text)) => text,
            other => panic!("unexpected help {other:?}"),
        }
    }

    #[test]
    fn test_required_without_default() {
        let mut a = arg("x", TypeDescriptor::int(), FieldDefault::Unset);
        a.field.help = Some("Documentation 1".into());
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.required, Some(true));
        assert_eq!(lowered.name_or_flag, "--x");
        assert_eq!(lowered.metavar.as_deref(), Some("INT"));
        assert_eq!(help_of(&lowered), "Documentation 1 (required)");
    }

    #[test]
    fn test_propagated_missing_is_required() {
        let lowered = arg("x", TypeDescriptor::int(), FieldDefault::PropagatedMissing)
            .lower()
            .unwrap();
        assert!(lowered.is_required());
    }

    #[test]
    fn test_default_help_is_shell_quoted() {
        let mut a = arg(
            "words",
            TypeDescriptor::list(TypeDescriptor::string()),
            FieldDefault::Value(Value::List(vec![Value::from("a b"), Value::from("c")])),
        );
        a.prefix = "opt".into();
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.name_or_flag, "--opt.words");
        assert_eq!(help_of(&lowered), "(default: 'a b' c)");
        assert_eq!(
            lowered.default,
            LoweredDefault::Tokens(vec!["a b".into(), "c".into()])
        );
    }

    #[test]
    fn test_store_true_flag() {
        let lowered = arg("flag", TypeDescriptor::boolean(), FieldDefault::Value(Value::Bool(false)))
            .lower()
            .unwrap();
        assert_eq!(lowered.action, FlagAction::StoreTrue);
        assert_eq!(lowered.name_or_flag, "--flag");
        assert!(matches!(lowered.instantiator, Some(Instantiator::Flag)));
        assert_eq!(lowered.nargs, None);
        assert_eq!(help_of(&lowered), "(sets: flag=True)");
        assert_eq!(lowered.default, LoweredDefault::Absent);
    }

    #[test]
    fn test_store_false_flag_is_negated() {
        let mut a = arg("use_cache", TypeDescriptor::boolean(), FieldDefault::Value(Value::Bool(true)));
        a.prefix = "train".into();
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.action, FlagAction::StoreFalse);
        assert_eq!(lowered.name_or_flag, "--train.no-use-cache");
        assert_eq!(lowered.dest.as_deref(), Some("train.use-cache"));
        assert_eq!(help_of(&lowered), "(sets: use_cache=False)");
    }

    #[test]
    fn test_bool_without_default_takes_token() {
        let lowered = arg("flag", TypeDescriptor::boolean(), FieldDefault::Unset)
            .lower()
            .unwrap();
        assert_eq!(lowered.action, FlagAction::Store);
        assert_eq!(lowered.metavar.as_deref(), Some("{True,False}"));
    }

    #[test]
    fn test_flag_conversion_off() {
        let a = with_marker(
            arg("flag", TypeDescriptor::boolean(), FieldDefault::Value(Value::Bool(false))),
            Marker::FlagConversionOff,
        );
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.action, FlagAction::Store);
        assert_eq!(help_of(&lowered), "(default: False)");
    }

    #[test]
    fn test_non_bool_default_for_bool_is_schema_error() {
        let err = arg("flag", TypeDescriptor::boolean(), FieldDefault::Value(Value::Int(1)))
            .lower()
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_unsupported_without_default_names_path() {
        let mut a = arg("sock", TypeDescriptor::opaque("Socket"), FieldDefault::Unset);
        a.prefix = "server_config".into();
        match a.lower().unwrap_err() {
            Error::UnsupportedType { path, .. } => assert_eq!(path, "server-config.sock"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unsupported_with_default_degrades_to_fixed() {
        let default = Value::from(StructValue::new("Socket").with("port", 80));
        let lowered = arg("sock", TypeDescriptor::opaque("Socket"), FieldDefault::Value(default))
            .lower()
            .unwrap();
        assert!(lowered.is_fixed());
        assert_eq!(lowered.required, Some(false));
        assert_eq!(lowered.metavar.as_deref(), Some("{fixed}"));
        assert_eq!(help_of(&lowered), "(fixed to: Socket(port=80))");
    }

    #[test]
    fn test_fixed_marker_overrides_flag() {
        let a = with_marker(
            arg("flag", TypeDescriptor::boolean(), FieldDefault::Value(Value::Bool(false))),
            Marker::Fixed,
        );
        let lowered = a.lower().unwrap();
        assert!(lowered.is_fixed());
        assert_eq!(lowered.action, FlagAction::Store);
        assert_eq!(lowered.name_or_flag, "--flag");
    }

    #[test]
    fn test_percent_is_escaped_and_suppress_hides() {
        let mut a = arg("ratio", TypeDescriptor::float(), FieldDefault::Value(Value::Float(0.5)));
        a.field.help = Some("Fraction in %".into());
        assert_eq!(help_of(&a.lower().unwrap()), "Fraction in %% (default: 0.5)");

        let hidden = with_marker(a, Marker::Suppress).lower().unwrap();
        assert_eq!(hidden.help, Some(HelpText::Suppressed));
    }

    #[test]
    fn test_excluded_field_help() {
        let lowered = arg("i", TypeDescriptor::int(), FieldDefault::ExcludeFromCall)
            .lower()
            .unwrap();
        assert_eq!(lowered.required, Some(false));
        assert_eq!(lowered.default, LoweredDefault::Excluded);
        assert_eq!(help_of(&lowered), "(unset by default)");
    }

    #[test]
    fn test_required_positional_keeps_arity() {
        let a = with_marker(
            arg("sources", TypeDescriptor::list(TypeDescriptor::path()), FieldDefault::Unset),
            Marker::Positional,
        );
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.name_or_flag, "sources");
        assert_eq!(lowered.nargs, Some(Arity::OneOrMore));
        assert_eq!(lowered.required, None);
        assert_eq!(lowered.dest, None);
        assert!(lowered.is_required());
    }

    #[test]
    fn test_optional_positional_single_becomes_zero_or_one() {
        let a = with_marker(
            arg("count", TypeDescriptor::int(), FieldDefault::Value(Value::Int(3))),
            Marker::Positional,
        );
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.nargs, Some(Arity::ZeroOrOne));
        assert_eq!(lowered.metavar.as_deref(), Some("[INT]"));
        assert!(!lowered.is_required());
    }

    #[test]
    fn test_optional_positional_sequence_accepts_placeholder() {
        let ty = TypeDescriptor::list(TypeDescriptor::enumeration("Color", ["RED", "GREEN"]));
        let default = Value::List(vec![Value::enumeration("Color", "RED")]);
        let a = with_marker(arg("colors", ty, FieldDefault::Value(default)), Marker::Positional);
        let lowered = a.lower().unwrap();
        assert_eq!(lowered.nargs, Some(Arity::All));
        assert_eq!(lowered.metavar.as_deref(), Some("[{RED,GREEN} [{RED,GREEN} ...]]"));
        let choices = lowered.choices.unwrap();
        assert!(choices.contains(MISSING_PLACEHOLDER));
        assert!(choices.contains("GREEN"));
        assert!(!choices.contains("BLUE"));
    }

    #[test]
    fn test_option_choices_reject_placeholder() {
        let ty = TypeDescriptor::list(TypeDescriptor::enumeration("Color", ["RED"]));
        let lowered = arg("colors", ty, FieldDefault::Unset).lower().unwrap();
        assert!(!lowered.choices.unwrap().contains(MISSING_PLACEHOLDER));
    }

    #[test]
    fn test_summary() {
        let lowered = arg("flag", TypeDescriptor::boolean(), FieldDefault::Value(Value::Bool(false)))
            .lower()
            .unwrap();
        let summary = ArgumentSummary::from(&lowered);
        assert_eq!(summary.name_or_flag, "--flag");
        assert!(!summary.required);
        assert_eq!(summary.help.as_deref(), Some("(sets: flag=True)"));
    }
}
