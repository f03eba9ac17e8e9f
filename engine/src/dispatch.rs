//! Parser layout: one clap command per scope, subcommands per union variant.
//!
//! The resolved field tree is flattened into scopes. A scope holds the leaves
//! of its struct (nested structs are inlined under dotted names) and turns
//! the first union it meets into a subcommand group; every later union of the
//! same scope is handed down into each branch of that group, so unions are
//! selected in declaration order.
//!
//! After parsing, [`ParserSpec::read_matches`] walks the selected branches
//! and fills a [`Namespace`] with raw values and union selections.

use std::collections::{HashMap, HashSet};

use argschema_core::{
    Arity, Error, FieldNode, NameRegistry, Result, StructTree, UnionNode, normalize_name,
    selector_token,
};
use clap::{ArgMatches, Command};
use serde::Serialize;
use tracing::debug;

use crate::parser::{LoweredLeaf, RawValue, flag_values, read_leaf, to_clap_arg};

/// One command of the generated parser.
#[derive(Debug, Clone)]
pub(crate) struct ParserSpec {
    pub name: String,
    pub description: Option<String>,
    pub leaves: Vec<LoweredLeaf>,
    pub subcommands: Option<SubcommandGroup>,
}

/// Subcommands choosing the variant of one union.
#[derive(Debug, Clone)]
pub(crate) struct SubcommandGroup {
    /// Raw dotted path of the union field.
    pub path: String,
    pub required: bool,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub token: String,
    /// Index into the union's variants.
    pub variant: usize,
    pub spec: ParserSpec,
}

/// Inputs shared by every scope while building a parser.
pub(crate) struct Layout<'a> {
    /// Flags owned by the parser itself, such as `--help`.
    pub reserved: &'a [&'a str],
    pub registry: &'a mut NameRegistry,
}

impl ParserSpec {
    /// Lays out the parser for a resolved root.
    pub(crate) fn build(root: &FieldNode, name: &str, layout: &mut Layout<'_>) -> Result<Self> {
        match root {
            FieldNode::Nested(nested) => Self::scope(
                name.to_string(),
                nested.tree.description.clone(),
                &nested.tree.children,
                Vec::new(),
                None,
                layout,
            ),
            FieldNode::Union(union) => Self::scope(
                name.to_string(),
                union.help.clone(),
                &[],
                vec![union],
                None,
                layout,
            ),
            FieldNode::Leaf(arg) => Err(Error::Invariant(format!(
                "root `{}` resolved to a single argument",
                arg.dest()
            ))),
        }
    }

    fn scope<'a>(
        name: String,
        description: Option<String>,
        children: &'a [FieldNode],
        pending: Vec<&'a UnionNode>,
        owner: Option<&str>,
        layout: &mut Layout<'_>,
    ) -> Result<Self> {
        let mut leaves = Vec::new();
        let mut unions = pending;
        collect(children, &mut leaves, &mut unions)?;
        validate_scope(&leaves, layout.reserved)?;
        for leaf in leaves.iter().filter(|leaf| !leaf.lowered.is_positional()) {
            layout
                .registry
                .register_flag(&leaf.lowered.name_or_flag, flag_values(&leaf.lowered), owner);
        }

        let subcommands = match unions.split_first() {
            Some((first, rest)) => Some(group(*first, rest, layout)?),
            None => None,
        };
        Ok(Self {
            name,
            description,
            leaves,
            subcommands,
        })
    }

    /// Builds the clap command for this scope and its branches.
    pub(crate) fn to_command(&self, strict_choices: bool) -> Command {
        let mut command = Command::new(self.name.clone())
            .args_override_self(true)
            .disable_help_subcommand(true)
            .subcommand_precedence_over_arg(true);
        if let Some(description) = &self.description {
            command = command.about(description.clone());
        }
        for leaf in &self.leaves {
            command = command.arg(to_clap_arg(leaf, strict_choices));
        }
        if let Some(group) = &self.subcommands {
            command = command
                .subcommand_required(group.required)
                .subcommand_value_name("SUBCOMMAND")
                .subcommand_help_heading(group_heading(&group.path));
            for branch in &group.branches {
                command = command.subcommand(branch.spec.to_command(strict_choices));
            }
        }
        command
    }

    /// Records the values and selections of one parse.
    pub(crate) fn read_matches(&self, matches: &ArgMatches, namespace: &mut Namespace) -> Result<()> {
        for leaf in &self.leaves {
            namespace.registered.insert(leaf.id.clone());
            if let Some(raw) = read_leaf(matches, leaf)? {
                namespace.values.insert(leaf.id.clone(), raw);
            }
        }
        let Some(group) = &self.subcommands else {
            return Ok(());
        };
        let Some((token, sub_matches)) = matches.subcommand() else {
            return Ok(());
        };
        let branch = group
            .branches
            .iter()
            .find(|branch| branch.token == token)
            .ok_or_else(|| Error::Invariant(format!("parser returned unknown subcommand `{token}`")))?;
        namespace.select(&group.path, branch.variant)?;
        branch.spec.read_matches(sub_matches, namespace)
    }

    /// Serializable view of this scope and its branches.
    pub(crate) fn summary(&self) -> LoweredSummary {
        LoweredSummary {
            command: self.name.clone(),
            description: self.description.clone(),
            arguments: self.leaves.iter().map(|leaf| (&leaf.lowered).into()).collect(),
            subcommand_required: self.subcommands.as_ref().is_some_and(|group| group.required),
            subcommands: self
                .subcommands
                .iter()
                .flat_map(|group| &group.branches)
                .map(|branch| branch.spec.summary())
                .collect(),
        }
    }

    /// Total number of arguments across every branch.
    pub(crate) fn argument_count(&self) -> usize {
        self.leaves.len()
            + self.subcommands.as_ref().map_or(0, |group| {
                group.branches.iter().map(|b| b.spec.argument_count()).sum()
            })
    }
}

/// Lowered parser layout, as reported by
/// [`Cli::lowered`](crate::Cli::lowered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoweredSummary {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub arguments: Vec<argschema_core::ArgumentSummary>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub subcommand_required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<LoweredSummary>,
}

fn group_heading(path: &str) -> String {
    if path.is_empty() {
        "Subcommands".to_string()
    } else {
        format!("Subcommands for {}", normalize_name(path))
    }
}

/// Lowers the leaves of `children`, inlining nested structs and queueing
/// unions.
fn collect<'a>(
    children: &'a [FieldNode],
    leaves: &mut Vec<LoweredLeaf>,
    unions: &mut Vec<&'a UnionNode>,
) -> Result<()> {
    for child in children {
        match child {
            FieldNode::Leaf(arg) => leaves.push(LoweredLeaf {
                id: arg.dest(),
                lowered: arg.lower()?,
            }),
            FieldNode::Nested(nested) => collect(&nested.tree.children, leaves, unions)?,
            FieldNode::Union(union) => unions.push(union),
        }
    }
    Ok(())
}

fn group<'a>(
    union: &'a UnionNode,
    rest: &[&'a UnionNode],
    layout: &mut Layout<'_>,
) -> Result<SubcommandGroup> {
    let mut branches = Vec::with_capacity(union.variants.len());
    for (index, variant) in union.variants.iter().enumerate() {
        let token = selector_token(&union.path, &variant.name);
        layout.registry.register_selector(&token);
        let (children, description) = match &variant.body {
            Some(StructTree {
                children,
                description,
                ..
            }) => (children.as_slice(), description.clone()),
            None => (&[][..], None),
        };
        let spec = ParserSpec::scope(
            token.clone(),
            description,
            children,
            rest.to_vec(),
            Some(&token),
            layout,
        )?;
        branches.push(Branch {
            token,
            variant: index,
            spec,
        });
    }
    debug!(
        path = %union.path,
        branches = branches.len(),
        required = union.default_variant.is_none(),
        "registered subcommand group"
    );
    Ok(SubcommandGroup {
        path: union.path.clone(),
        required: union.default_variant.is_none(),
        branches,
    })
}

/// Rejects scopes clap could not parse unambiguously.
fn validate_scope(leaves: &[LoweredLeaf], reserved: &[&str]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut flags = HashSet::new();
    for leaf in leaves {
        let lowered = &leaf.lowered;
        if !ids.insert(leaf.id.as_str()) {
            return Err(scope_error(&leaf.id, "two fields lower to the same argument"));
        }
        if lowered.is_positional() {
            continue;
        }
        if reserved.contains(&lowered.name_or_flag.as_str()) {
            return Err(scope_error(
                &leaf.id,
                format!("`{}` is reserved by the parser", lowered.name_or_flag),
            ));
        }
        if !flags.insert(normalize_name(&lowered.name_or_flag)) {
            return Err(scope_error(
                &leaf.id,
                format!("`{}` collides with another flag", lowered.name_or_flag),
            ));
        }
    }

    let positionals: Vec<&LoweredLeaf> = leaves.iter().filter(|l| l.lowered.is_positional()).collect();
    let mut seen_optional = false;
    for (i, leaf) in positionals.iter().enumerate() {
        let elastic = matches!(leaf.lowered.nargs, Some(Arity::OneOrMore | Arity::All));
        if elastic && i + 1 != positionals.len() {
            return Err(scope_error(
                &leaf.id,
                "only the last positional argument may take a variable number of values",
            ));
        }
        if leaf.lowered.is_required() && seen_optional {
            return Err(scope_error(
                &leaf.id,
                "a required positional argument cannot follow an optional one",
            ));
        }
        seen_optional |= !leaf.lowered.is_required();
    }
    Ok(())
}

fn scope_error(id: &str, message: impl Into<String>) -> Error {
    Error::Schema {
        path: id.to_string(),
        message: message.into(),
    }
}

/// Selection progress of one union during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DispatchState {
    #[default]
    Unselected,
    Selected(usize),
    Assembled(usize),
}

/// Raw results of one parse.
#[derive(Debug, Default)]
pub(crate) struct Namespace {
    pub values: HashMap<String, RawValue>,
    /// Every argument registered in the selected scopes.
    pub registered: HashSet<String>,
    pub selections: HashMap<String, DispatchState>,
}

impl Namespace {
    fn select(&mut self, path: &str, variant: usize) -> Result<()> {
        let state = self.selections.entry(path.to_string()).or_default();
        match *state {
            DispatchState::Unselected => {
                *state = DispatchState::Selected(variant);
                Ok(())
            }
            DispatchState::Selected(previous) if previous == variant => Ok(()),
            other => Err(Error::Invariant(format!(
                "union `{path}` selected twice ({other:?}, then variant {variant})"
            ))),
        }
    }

    /// Variant to assemble for `union`: the selected one, else its default.
    pub(crate) fn variant_for(&mut self, union: &UnionNode) -> Result<usize> {
        let state = self.selections.entry(union.path.clone()).or_default();
        let variant = match *state {
            DispatchState::Selected(variant) => variant,
            DispatchState::Unselected => match union.default_variant {
                Some(variant) => variant,
                None => {
                    return Err(Error::MissingSubcommand {
                        path: if union.path.is_empty() {
                            "<root>".to_string()
                        } else {
                            normalize_name(&union.path)
                        },
                        choices: union
                            .variants
                            .iter()
                            .map(|v| selector_token(&union.path, &v.name))
                            .collect(),
                    });
                }
            },
            DispatchState::Assembled(_) => {
                return Err(Error::Invariant(format!(
                    "union `{}` assembled twice",
                    union.path
                )));
            }
        };
        *state = DispatchState::Assembled(variant);
        debug!(path = %union.path, variant = %union.variants[variant].name, "dispatching union");
        Ok(variant)
    }
}
