//! Registration of lowered arguments with clap and reading them back.
//!
//! Every lowered argument becomes one [`clap::Arg`] keyed by its canonical
//! dotted path. Values come back from clap as raw tokens or booleans; typed
//! conversion happens later in the assembler.

use std::ffi::OsStr;

use argschema_core::{
    AllowedValues, Arity, FlagAction, FlagValues, HelpText, LoweredArgumentDefinition, MISSING_PLACEHOLDER,
    Result, unescape_percent,
};
use clap::builder::{PossibleValue, TypedValueParser, ValueParser};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

/// A lowered argument together with its namespace key.
#[derive(Debug, Clone)]
pub(crate) struct LoweredLeaf {
    pub id: String,
    pub lowered: LoweredArgumentDefinition,
}

/// What the parser recorded for one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawValue {
    Flag(bool),
    Tokens(Vec<String>),
}

/// Accepts only the tokens of an allowed-value set.
#[derive(Debug, Clone)]
struct ChoiceValueParser {
    allowed: AllowedValues,
}

impl TypedValueParser for ChoiceValueParser {
    type Value = String;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> std::result::Result<String, clap::Error> {
        let token = value
            .to_str()
            .ok_or_else(|| clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd))?;
        if self.allowed.contains(token) {
            return Ok(token.to_string());
        }
        let mut err = clap::Error::new(ErrorKind::InvalidValue).with_cmd(cmd);
        if let Some(arg) = arg {
            err.insert(ContextKind::InvalidArg, ContextValue::String(arg.to_string()));
        }
        err.insert(ContextKind::InvalidValue, ContextValue::String(token.to_string()));
        err.insert(
            ContextKind::ValidValue,
            ContextValue::Strings(self.allowed.tokens.clone()),
        );
        Err(err)
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        Some(Box::new(
            self.allowed.tokens.iter().map(|token| PossibleValue::new(token.clone())),
        ))
    }
}

/// Rejects every value: the argument is fixed to its default.
#[derive(Debug, Clone, Copy)]
struct FixedValueParser;

impl TypedValueParser for FixedValueParser {
    type Value = String;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        _value: &OsStr,
    ) -> std::result::Result<String, clap::Error> {
        let name = arg.map_or_else(|| "argument".to_string(), |arg| format!("`{arg}`"));
        Err(cmd
            .clone()
            .error(ErrorKind::ValueValidation, format!("{name} is fixed to its default and cannot be set")))
    }
}

/// Builds the clap argument for one lowered leaf.
pub(crate) fn to_clap_arg(leaf: &LoweredLeaf, strict_choices: bool) -> Arg {
    let lowered = &leaf.lowered;
    let mut arg = Arg::new(leaf.id.clone());

    if !lowered.is_positional() {
        let long = lowered
            .name_or_flag
            .strip_prefix("--")
            .unwrap_or(&lowered.name_or_flag);
        arg = arg.long(long.to_string());
    }

    arg = match &lowered.help {
        Some(HelpText::Visible(text)) if !text.is_empty() => arg.help(unescape_percent(text)),
        Some(HelpText::Suppressed) => arg.hide(true),
        _ => arg,
    };

    match lowered.action {
        FlagAction::StoreTrue => return arg.action(ArgAction::SetTrue),
        FlagAction::StoreFalse => return arg.action(ArgAction::SetFalse),
        FlagAction::Store => {}
    }

    arg = arg
        .action(ArgAction::Set)
        .allow_negative_numbers(true)
        .required(lowered.is_required())
        .value_names(value_names(lowered));

    if lowered.is_fixed() {
        let count = if lowered.is_positional() { 0..=1 } else { 1..=1 };
        return arg.num_args(count).value_parser(FixedValueParser);
    }

    arg = match lowered.nargs.unwrap_or(Arity::Exactly(1)) {
        Arity::Exactly(n) => arg.num_args(n),
        Arity::OneOrMore => arg.num_args(1..),
        Arity::ZeroOrOne => arg.num_args(0..=1),
        Arity::All => arg.num_args(0..),
    };

    // Optional positionals defer to the stored default through a reserved
    // token that the reader skips.
    if lowered.is_positional() && !lowered.is_required() {
        arg = arg
            .default_value(MISSING_PLACEHOLDER)
            .hide_default_value(true);
    }

    match &lowered.choices {
        Some(allowed) if strict_choices => arg
            .value_parser(ChoiceValueParser {
                allowed: allowed.clone(),
            })
            .hide_possible_values(true),
        _ => arg.value_parser(ValueParser::string()),
    }
}

/// Tokens an option takes after its name, matching [`to_clap_arg`].
pub(crate) fn flag_values(lowered: &LoweredArgumentDefinition) -> FlagValues {
    match lowered.action {
        FlagAction::StoreTrue | FlagAction::StoreFalse => FlagValues::Switch,
        FlagAction::Store if lowered.is_fixed() => FlagValues::Exactly(1),
        FlagAction::Store => match lowered.nargs.unwrap_or(Arity::Exactly(1)) {
            Arity::Exactly(n) => FlagValues::Exactly(n),
            Arity::OneOrMore | Arity::ZeroOrOne | Arity::All => FlagValues::Variable,
        },
    }
}

/// Value names shown in usage lines.
///
/// Fixed-count metavars are split into one name per token; elastic ones keep
/// only the repeated unit.
fn value_names(lowered: &LoweredArgumentDefinition) -> Vec<String> {
    let metavar = lowered.metavar.as_deref().unwrap_or("VALUE");
    let metavar = if lowered.is_positional() && !lowered.is_required() {
        metavar
            .strip_prefix('[')
            .and_then(|m| m.strip_suffix(']'))
            .unwrap_or(metavar)
    } else {
        metavar
    };
    match lowered.nargs {
        Some(Arity::Exactly(n)) if n > 1 => {
            let words: Vec<String> = metavar.split(' ').map(str::to_string).collect();
            if words.len() == n {
                words
            } else {
                vec![metavar.to_string()]
            }
        }
        Some(Arity::OneOrMore | Arity::All | Arity::ZeroOrOne) => {
            let unit = metavar.split(" [").next().unwrap_or(metavar);
            vec![unit.to_string()]
        }
        _ => vec![metavar.to_string()],
    }
}

/// Reads what the user supplied for one leaf.
///
/// Values clap filled in from its own defaults are ignored, as is the
/// placeholder of optional positionals.
pub(crate) fn read_leaf(matches: &ArgMatches, leaf: &LoweredLeaf) -> Result<Option<RawValue>> {
    let id = leaf.id.as_str();
    if matches.value_source(id) != Some(ValueSource::CommandLine) {
        return Ok(None);
    }
    match leaf.lowered.action {
        FlagAction::StoreTrue | FlagAction::StoreFalse => {
            let value = matches
                .try_get_one::<bool>(id)
                .map_err(|err| invariant(id, err))?;
            Ok(value.copied().map(RawValue::Flag))
        }
        FlagAction::Store => {
            let Some(values) = matches
                .try_get_many::<String>(id)
                .map_err(|err| invariant(id, err))?
            else {
                return Ok(None);
            };
            let tokens: Vec<String> = values.cloned().collect();
            if tokens.iter().any(|t| t == MISSING_PLACEHOLDER) {
                return Ok(None);
            }
            Ok(Some(RawValue::Tokens(tokens)))
        }
    }
}

fn invariant(id: &str, err: impl std::fmt::Display) -> argschema_core::Error {
    argschema_core::Error::Invariant(format!("cannot read `{id}` from the parser: {err}"))
}

#[cfg(test)]
mod tests {
    use argschema_core::{Instantiator, LoweredDefault};

    use super::*;

    fn option(flag: &str, nargs: Arity, metavar: &str) -> LoweredLeaf {
        LoweredLeaf {
            id: flag.trim_start_matches('-').to_string(),
            lowered: LoweredArgumentDefinition {
                instantiator: Some(Instantiator::Flag),
                name_or_flag: flag.to_string(),
                dest: Some(flag.trim_start_matches('-').to_string()),
                required: Some(false),
                nargs: Some(nargs),
                metavar: Some(metavar.to_string()),
                help: Some(HelpText::Visible("Some help".to_string())),
                default: LoweredDefault::Absent,
                ..Default::default()
            },
        }
    }

    fn parse(leaf: &LoweredLeaf, args: &[&str]) -> std::result::Result<ArgMatches, clap::Error> {
        Command::new("test")
            .arg(to_clap_arg(leaf, true))
            .try_get_matches_from(std::iter::once("test").chain(args.iter().copied()))
    }

    #[test]
    fn test_fixed_count_value_names() {
        let leaf = option("--x", Arity::Exactly(2), "INT STR");
        assert_eq!(value_names(&leaf.lowered), ["INT", "STR"]);
        let matches = parse(&leaf, &["--x", "1", "a"]).unwrap();
        assert_eq!(
            read_leaf(&matches, &leaf).unwrap(),
            Some(RawValue::Tokens(vec!["1".into(), "a".into()]))
        );
    }

    #[test]
    fn test_elastic_value_name_keeps_unit() {
        let leaf = option("--x", Arity::OneOrMore, "INT [INT ...]");
        assert_eq!(value_names(&leaf.lowered), ["INT"]);
    }

    #[test]
    fn test_absent_option_reads_as_none() {
        let leaf = option("--x", Arity::Exactly(1), "INT");
        let matches = parse(&leaf, &[]).unwrap();
        assert_eq!(read_leaf(&matches, &leaf).unwrap(), None);
    }

    #[test]
    fn test_negative_numbers_are_values() {
        let leaf = option("--x", Arity::Exactly(1), "INT");
        let matches = parse(&leaf, &["--x", "-3"]).unwrap();
        assert_eq!(
            read_leaf(&matches, &leaf).unwrap(),
            Some(RawValue::Tokens(vec!["-3".into()]))
        );
    }

    #[test]
    fn test_choices_are_enforced() {
        let mut leaf = option("--c", Arity::Exactly(1), "{RED,GREEN}");
        leaf.lowered.choices = Some(AllowedValues {
            tokens: vec!["RED".into(), "GREEN".into()],
            accept_placeholder: false,
        });
        assert!(parse(&leaf, &["--c", "RED"]).is_ok());
        let err = parse(&leaf, &["--c", "BLUE"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_optional_positional_placeholder_is_skipped() {
        let leaf = LoweredLeaf {
            id: "count".into(),
            lowered: LoweredArgumentDefinition {
                instantiator: Some(Instantiator::Flag),
                name_or_flag: "count".into(),
                nargs: Some(Arity::ZeroOrOne),
                metavar: Some("[INT]".into()),
                ..Default::default()
            },
        };
        let matches = parse(&leaf, &[]).unwrap();
        assert_eq!(read_leaf(&matches, &leaf).unwrap(), None);
        let matches = parse(&leaf, &["4"]).unwrap();
        assert_eq!(
            read_leaf(&matches, &leaf).unwrap(),
            Some(RawValue::Tokens(vec!["4".into()]))
        );
    }

    #[test]
    fn test_store_false_flag() {
        let leaf = LoweredLeaf {
            id: "cache".into(),
            lowered: LoweredArgumentDefinition {
                instantiator: Some(Instantiator::Flag),
                name_or_flag: "--no-cache".into(),
                action: FlagAction::StoreFalse,
                ..Default::default()
            },
        };
        let matches = parse(&leaf, &[]).unwrap();
        assert_eq!(read_leaf(&matches, &leaf).unwrap(), None);
        let matches = parse(&leaf, &["--no-cache"]).unwrap();
        assert_eq!(read_leaf(&matches, &leaf).unwrap(), Some(RawValue::Flag(false)));
    }

    #[test]
    fn test_fixed_argument_rejects_values() {
        let leaf = LoweredLeaf {
            id: "sock".into(),
            lowered: LoweredArgumentDefinition {
                instantiator: None,
                name_or_flag: "--sock".into(),
                required: Some(false),
                metavar: Some("{fixed}".into()),
                ..Default::default()
            },
        };
        assert!(parse(&leaf, &[]).is_ok());
        let err = parse(&leaf, &["--sock", "x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
