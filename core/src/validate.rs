//! Schema and document validation.
//!
//! Catches structural errors such as duplicate or reserved field names,
//! unknown type references and mistyped boolean defaults before a schema is
//! lowered.
//!
//! # Examples
//!
//! ```
//! use argschema_core::*;
//!
//! let schema = StructSchema::new("Args")
//!     .field(FieldSchema::new("verbose", TypeDescriptor::boolean()).default(false));
//! assert!(validate_struct(&schema).is_empty());
//!
//! // Invalid: a boolean field defaulting to an integer
//! let bad = StructSchema::new("Args")
//!     .field(FieldSchema::new("verbose", TypeDescriptor::boolean()).default(1));
//! assert!(!validate_struct(&bad).is_empty());
//! ```

use std::collections::HashSet;

use serde_yaml::Value as Yaml;
use thiserror::Error;

use crate::document::{BUILTIN_GENERICS, SchemaDocument, TypeDecl, TypeExpr, parse_type_expr, scalar};
use crate::types::{FieldDefault, ScalarKind, StructSchema, TypeDescriptor};
use crate::value::Value;

/// Field name that would collide with the generated `--help` flag.
const RESERVED_FIELD: &str = "help";

/// Schema/document validation errors.
///
/// Each variant describes a specific structural problem found during
/// validation. The `Display` impl provides a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Document version string is empty.
    #[error("document version cannot be empty")]
    EmptyVersion,
    /// Root type expression is empty.
    #[error("root type cannot be empty")]
    EmptyRoot,
    /// Field name is empty or whitespace-only.
    #[error("field name cannot be empty in `{0}`")]
    EmptyFieldName(String),
    /// Two fields of one struct share a name.
    #[error("duplicate field `{field}` in `{ty}`")]
    DuplicateField { ty: String, field: String },
    /// A generic struct declares the same parameter twice.
    #[error("duplicate type parameter `{param}` in `{ty}`")]
    DuplicateTypeParam { ty: String, param: String },
    /// A field would collide with the generated help flag.
    #[error("field `{field}` in `{ty}` uses the reserved name `help`")]
    ReservedFieldName { ty: String, field: String },
    /// A boolean field has a default that is not a boolean.
    #[error("boolean field `{field}` in `{ty}` has a non-boolean default")]
    NonBoolDefault { ty: String, field: String },
    /// A type expression names a type that is not declared.
    #[error("unknown type `{name}` referenced from `{location}`")]
    UnknownType { location: String, name: String },
    /// A type expression does not parse.
    #[error("invalid type expression at `{location}`: {message}")]
    InvalidTypeExpression { location: String, message: String },
    /// An enum declaration has no members or also declares fields.
    #[error("invalid enum `{0}`: enums need members and take no fields or params")]
    InvalidEnum(String),
}

/// Validates a struct schema built in code.
///
/// Checks for empty and duplicate field names, duplicate type parameters,
/// the reserved `help` name and non-boolean defaults on boolean fields.
pub fn validate_struct(schema: &StructSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let ty = schema.name.as_str();

    let mut seen_params = HashSet::new();
    for param in &schema.type_params {
        if !seen_params.insert(param.as_str()) {
            errors.push(ValidationError::DuplicateTypeParam {
                ty: ty.to_string(),
                param: param.clone(),
            });
        }
    }

    let mut seen_fields = HashSet::new();
    for field in &schema.fields {
        errors.extend(check_field_name(ty, &field.name, &mut seen_fields));
        let is_bool = field.ty == TypeDescriptor::Scalar(ScalarKind::Bool);
        let bad_default = matches!(
            &field.default,
            FieldDefault::Value(value) if !matches!(value, Value::Bool(_) | Value::Missing)
        );
        if is_bool && bad_default {
            errors.push(ValidationError::NonBoolDefault {
                ty: ty.to_string(),
                field: field.name.clone(),
            });
        }
    }

    errors
}

fn check_field_name<'a>(
    ty: &str,
    name: &'a str,
    seen: &mut HashSet<&'a str>,
) -> Option<ValidationError> {
    if name.trim().is_empty() {
        return Some(ValidationError::EmptyFieldName(ty.to_string()));
    }
    if !seen.insert(name) {
        return Some(ValidationError::DuplicateField {
            ty: ty.to_string(),
            field: name.to_string(),
        });
    }
    if name == RESERVED_FIELD {
        return Some(ValidationError::ReservedFieldName {
            ty: ty.to_string(),
            field: name.to_string(),
        });
    }
    None
}

/// Validates a schema document without compiling it.
///
/// # Examples
///
/// ```
/// use argschema_core::*;
///
/// let document = SchemaDocument::from_yaml_str(r#"
/// root: Args
/// types:
///   Args:
///     fields:
///       - { name: mode, type: Mode }
/// "#).unwrap();
/// let errors = validate_document(&document);
/// assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownType { .. })));
/// ```
pub fn validate_document(document: &SchemaDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if document.version.trim().is_empty() {
        errors.push(ValidationError::EmptyVersion);
    }
    if document.root.trim().is_empty() {
        errors.push(ValidationError::EmptyRoot);
    } else {
        errors.extend(check_type_expr(document, &document.root, &[], "root"));
    }

    for (name, decl) in &document.types {
        if decl.is_enum() {
            let empty = decl.members.as_ref().is_none_or(Vec::is_empty);
            if empty || !decl.fields.is_empty() || !decl.params.is_empty() {
                errors.push(ValidationError::InvalidEnum(name.clone()));
            }
            continue;
        }
        errors.extend(validate_struct_decl(document, name, decl));
    }

    errors
}

fn validate_struct_decl(document: &SchemaDocument, ty: &str, decl: &TypeDecl) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_params = HashSet::new();
    for param in &decl.params {
        if !seen_params.insert(param.as_str()) {
            errors.push(ValidationError::DuplicateTypeParam {
                ty: ty.to_string(),
                param: param.clone(),
            });
        }
    }

    let mut seen_fields = HashSet::new();
    for field in &decl.fields {
        errors.extend(check_field_name(ty, &field.name, &mut seen_fields));
        let location = format!("{ty}.{}", field.name);
        errors.extend(check_type_expr(document, &field.ty, &decl.params, &location));

        let bad_default = match &field.default {
            Some(Yaml::Bool(_) | Yaml::Tagged(_)) | None => false,
            Some(_) => true,
        };
        if field.ty.trim() == "bool" && bad_default {
            errors.push(ValidationError::NonBoolDefault {
                ty: ty.to_string(),
                field: field.name.clone(),
            });
        }
    }

    errors
}

fn check_type_expr(
    document: &SchemaDocument,
    text: &str,
    params: &[String],
    location: &str,
) -> Vec<ValidationError> {
    match parse_type_expr(text) {
        Ok(expr) => {
            let mut errors = Vec::new();
            collect_unknown(document, &expr, params, location, &mut errors);
            errors
        }
        Err(message) => vec![ValidationError::InvalidTypeExpression {
            location: location.to_string(),
            message,
        }],
    }
}

fn collect_unknown(
    document: &SchemaDocument,
    expr: &TypeExpr,
    params: &[String],
    location: &str,
    errors: &mut Vec<ValidationError>,
) {
    let known = |name: &str| {
        scalar(name).is_some() || params.iter().any(|p| p == name) || document.types.contains_key(name)
    };
    match expr {
        TypeExpr::Atom(name) if name == "..." => {}
        TypeExpr::Atom(name) if !known(name) => errors.push(ValidationError::UnknownType {
            location: location.to_string(),
            name: name.clone(),
        }),
        TypeExpr::Atom(_) => {}
        TypeExpr::Apply(name, _) if name == "literal" => {}
        TypeExpr::Apply(name, args) => {
            if !BUILTIN_GENERICS.contains(&name.as_str()) && !document.types.contains_key(name) {
                errors.push(ValidationError::UnknownType {
                    location: location.to_string(),
                    name: name.clone(),
                });
            }
            for arg in args {
                collect_unknown(document, arg, params, location, errors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSchema;

    fn document(yaml: &str) -> SchemaDocument {
        SchemaDocument::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_validate_struct_rejects_duplicate_fields() {
        let schema = StructSchema::new("A")
            .field(FieldSchema::new("x", TypeDescriptor::int()))
            .field(FieldSchema::new("x", TypeDescriptor::float()));
        assert_eq!(
            validate_struct(&schema),
            vec![ValidationError::DuplicateField {
                ty: "A".to_string(),
                field: "x".to_string()
            }]
        );
    }

    #[test]
    fn test_validate_struct_rejects_reserved_and_params() {
        let schema = StructSchema::new("A")
            .type_params(["T", "T"])
            .field(FieldSchema::new("help", TypeDescriptor::string()));
        let errors = validate_struct(&schema);
        assert!(errors.contains(&ValidationError::DuplicateTypeParam {
            ty: "A".into(),
            param: "T".into()
        }));
        assert!(errors.contains(&ValidationError::ReservedFieldName {
            ty: "A".into(),
            field: "help".into()
        }));
    }

    #[test]
    fn test_validate_document_accepts_valid_document() {
        let doc = document(
            r#"
root: "union[A, B[int]]"
types:
  Mode:
    enum: [fast, slow]
  A:
    fields:
      - { name: mode, type: Mode, default: fast }
      - { name: verbose, type: bool, default: false }
  B:
    params: [T]
    fields:
      - { name: values, type: "dict[str, tuple[T, ...]]" }
      - { name: pick, type: "literal[1, 2]" }
"#,
        );
        assert_eq!(validate_document(&doc), Vec::new());
    }

    #[test]
    fn test_validate_document_reports_every_problem() {
        let doc = document(
            r#"
version: ""
root: A
types:
  Empty:
    enum: []
  A:
    fields:
      - { name: flag, type: bool, default: 1 }
      - { name: "", type: int }
      - { name: other, type: "list[Missing]" }
"#,
        );
        let errors = validate_document(&doc);
        assert!(errors.contains(&ValidationError::EmptyVersion));
        assert!(errors.contains(&ValidationError::InvalidEnum("Empty".into())));
        assert!(errors.contains(&ValidationError::NonBoolDefault {
            ty: "A".into(),
            field: "flag".into()
        }));
        assert!(errors.contains(&ValidationError::EmptyFieldName("A".into())));
        assert!(errors.contains(&ValidationError::UnknownType {
            location: "A.other".into(),
            name: "Missing".into()
        }));
    }

    #[test]
    fn test_invalid_type_expression() {
        let doc = document("root: \"list[int\"\n");
        assert!(matches!(
            validate_document(&doc).as_slice(),
            [ValidationError::InvalidTypeExpression { .. }]
        ));
    }
}
