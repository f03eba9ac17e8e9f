//! Flag naming, selector tokens and help-text formatting helpers.
//!
//! Canonical flag names are dotted paths built from the ancestor chain with
//! underscores turned into hyphens (`child_struct.arg_name` →
//! `child-struct.arg-name`). [`NameRegistry`] remembers every canonical flag
//! and selector token of a parser so user spellings that mix `-` and `_` can
//! be rewritten before parsing.

use std::collections::BTreeMap;

use heck::ToKebabCase;

use crate::types::TypeDescriptor;

/// Reserved token used as a parser-side default for optional positionals.
///
/// It only ever defers default substitution to the assembler; it is never a
/// valid user input.
pub const MISSING_PLACEHOLDER: &str = "__argschema_missing__";

/// Metavars at least this long are abbreviated when repeated.
const METAVAR_REPEAT_LIMIT: usize = 32;

/// Joins path segments with `.`, skipping empty ones, and normalizes
/// underscores to hyphens.
///
/// # Examples
///
/// ```
/// use argschema_core::make_field_name;
///
/// assert_eq!(make_field_name(["child_struct", "arg_name"]), "child-struct.arg-name");
/// assert_eq!(make_field_name(["", "x"]), "x");
/// ```
pub fn make_field_name<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
        .replace('_', "-")
}

/// Joins a raw (unnormalized) dotted path.
pub fn join_path(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{name}"),
    }
}

/// Canonical spelling of a user-supplied name.
pub fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Deterministic subcommand name for one union variant.
///
/// Struct names are kebab-cased and followed by their type arguments.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use argschema_core::{StructSchema, TypeDescriptor, variant_name};
///
/// let server = TypeDescriptor::from(StructSchema::new("HTTPServer"));
/// assert_eq!(variant_name(&server), "http-server");
///
/// let command = Arc::new(StructSchema::new("Command").type_params(["T"]));
/// let applied = TypeDescriptor::generic(command, vec![TypeDescriptor::int()]);
/// assert_eq!(variant_name(&applied), "command-int");
/// ```
pub fn variant_name(ty: &TypeDescriptor) -> String {
    let joined = |items: &[TypeDescriptor]| {
        items.iter().map(variant_name).collect::<Vec<_>>().join("-")
    };
    match ty {
        TypeDescriptor::Struct(st) if st.args.is_empty() => st.schema.name.to_kebab_case(),
        TypeDescriptor::Struct(st) => {
            format!("{}-{}", st.schema.name.to_kebab_case(), joined(&st.args))
        }
        TypeDescriptor::Scalar(kind) => kind.label().to_string(),
        TypeDescriptor::Choice(set) => set
            .name
            .as_deref()
            .map_or_else(|| "literal".to_string(), |name| name.to_kebab_case()),
        TypeDescriptor::Optional(inner) => format!("optional-{}", variant_name(inner)),
        TypeDescriptor::Sequence { element, .. } => format!("list-{}", variant_name(element)),
        TypeDescriptor::Tuple(items) => format!("tuple-{}", joined(items)),
        TypeDescriptor::Mapping(k, v) => {
            format!("dict-{}-{}", variant_name(k), variant_name(v))
        }
        TypeDescriptor::Union(items) => items
            .iter()
            .map(variant_name)
            .collect::<Vec<_>>()
            .join("-or-"),
        TypeDescriptor::TypeVar(name) | TypeDescriptor::Opaque(name) => name.to_kebab_case(),
    }
}

/// Selector token choosing `variant` for the union at `path`.
///
/// Unions at the root have no path prefix.
pub fn selector_token(path: &str, variant: &str) -> String {
    if path.is_empty() {
        variant.to_string()
    } else {
        format!("{}:{variant}", make_field_name([path]))
    }
}

/// Escapes literal percent signs in documentation text.
pub fn escape_percent(text: &str) -> String {
    text.replace('%', "%%")
}

/// Reverses [`escape_percent`].
pub fn unescape_percent(text: &str) -> String {
    text.replace("%%", "%")
}

/// Quotes a token so a POSIX shell would read it back unchanged.
///
/// # Examples
///
/// ```
/// use argschema_core::shell_quote;
///
/// assert_eq!(shell_quote("abc"), "abc");
/// assert_eq!(shell_quote("hello world"), "'hello world'");
/// assert_eq!(shell_quote(""), "''");
/// ```
pub fn shell_quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    let safe = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', "'\"'\"'"))
    }
}

/// Metavar for one-or-more repetitions of `single`.
pub fn multi_metavar(single: &str) -> String {
    if single.chars().count() >= METAVAR_REPEAT_LIMIT {
        format!("{single} [...]")
    } else {
        format!("{single} [{single} ...]")
    }
}

/// Joins the metavars of union alternatives.
///
/// Adjacent brace groups merge into one set and multi-word metavars are
/// wrapped in braces:
///
/// ```
/// use argschema_core::join_union_metavars;
///
/// let metavars = ["{0,1,2}", "{3,4}", "STR"].map(String::from);
/// assert_eq!(join_union_metavars(&metavars), "{0,1,2,3,4}|STR");
///
/// let metavars = ["{None}", "INT [INT ...]"].map(String::from);
/// assert_eq!(join_union_metavars(&metavars), "{None}|{INT [INT ...]}");
/// ```
pub fn join_union_metavars(metavars: &[String]) -> String {
    let mut merged: Vec<String> = Vec::new();
    for current in metavars {
        match merged.last_mut() {
            Some(prev) if is_brace_group(prev) && is_brace_group(current) => {
                prev.pop();
                prev.push(',');
                prev.push_str(&current[1..]);
            }
            _ => merged.push(current.clone()),
        }
    }
    merged
        .into_iter()
        .map(|m| if m.contains(' ') { format!("{{{m}}}") } else { m })
        .collect::<Vec<_>>()
        .join("|")
}

fn is_brace_group(metavar: &str) -> bool {
    metavar.starts_with('{') && metavar.ends_with('}')
}

/// Number of tokens an option consumes after its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValues {
    /// A switch such as `--verbose` or `--no-cache`.
    Switch,
    /// Exactly this many value tokens.
    Exactly(usize),
    /// Values up to the next option or selector token.
    Variable,
}

#[derive(Debug, Clone)]
struct RegisteredFlag {
    canonical: String,
    values: FlagValues,
}

/// Canonical flag and selector names of one parser, keyed by normalized
/// spelling.
///
/// # Examples
///
/// ```
/// use argschema_core::{FlagValues, NameRegistry};
///
/// let mut registry = NameRegistry::default();
/// registry.register_flag("--child-struct.arg-name", FlagValues::Exactly(1), None);
/// registry.register_flag("--label", FlagValues::Exactly(1), None);
/// registry.register_selector("bc:http-server");
///
/// let args = registry.canonicalize([
///     "--child_struct.arg_name=three_five",
///     "--label",
///     "bc:http_server",
///     "bc:http_server",
/// ]);
/// assert_eq!(
///     args,
///     vec!["--child-struct.arg-name=three_five", "--label", "bc:http_server", "bc:http-server"]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    flags: BTreeMap<String, RegisteredFlag>,
    selectors: BTreeMap<String, String>,
    owners: BTreeMap<String, Vec<String>>,
}

impl NameRegistry {
    /// Records a canonical `--flag`, optionally owned by a variant selector.
    pub fn register_flag(&mut self, flag: &str, values: FlagValues, owner: Option<&str>) {
        self.flags.insert(
            normalize_name(flag),
            RegisteredFlag {
                canonical: flag.to_string(),
                values,
            },
        );
        if let Some(owner) = owner {
            let owners = self.owners.entry(flag.to_string()).or_default();
            if !owners.iter().any(|o| o == owner) {
                owners.push(owner.to_string());
            }
        }
    }

    /// Records a canonical selector token.
    pub fn register_selector(&mut self, token: &str) {
        self.selectors.insert(normalize_name(token), token.to_string());
    }

    /// Looks up the canonical spelling of a flag.
    pub fn canonical_flag(&self, spelled: &str) -> Option<&str> {
        self.flags
            .get(&normalize_name(spelled))
            .map(|flag| flag.canonical.as_str())
    }

    /// Looks up the canonical spelling of a selector token.
    pub fn canonical_selector(&self, spelled: &str) -> Option<&str> {
        self.selectors.get(&normalize_name(spelled)).map(String::as_str)
    }

    /// Variant selectors whose fields define `flag`.
    pub fn owners(&self, flag: &str) -> &[String] {
        self.canonical_flag(flag)
            .and_then(|canonical| self.owners.get(canonical))
            .map_or(&[], Vec::as_slice)
    }

    /// Rewrites flag and selector spellings to their canonical form.
    ///
    /// Tokens consumed as values of a fixed-count option, and everything
    /// after a bare `--`, are left untouched. A selector spelling after a
    /// variable-count option ends that option's values, as it would with the
    /// canonical spelling.
    pub fn canonicalize<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        let mut owed = 0usize;
        let mut passthrough = false;
        for arg in args.into_iter().map(Into::into) {
            if passthrough || owed > 0 {
                owed = owed.saturating_sub(1);
                out.push(arg);
                continue;
            }
            if arg == "--" {
                passthrough = true;
                out.push(arg);
                continue;
            }
            if arg.starts_with("--") {
                let (name, value) = match arg.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (arg.as_str(), None),
                };
                let rewritten = match self.flags.get(&normalize_name(name)) {
                    Some(flag) => {
                        if let (None, FlagValues::Exactly(n)) = (value, flag.values) {
                            owed = n;
                        }
                        match value {
                            Some(value) => format!("{}={value}", flag.canonical),
                            None => flag.canonical.clone(),
                        }
                    }
                    None => arg.clone(),
                };
                out.push(rewritten);
                continue;
            }
            let rewritten = self.canonical_selector(&arg).map(str::to_string);
            out.push(rewritten.unwrap_or(arg));
        }
        out
    }
}
