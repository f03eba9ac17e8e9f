//! Error types for schema resolution, lowering and value assembly.
//!
//! [`Error`] is the crate-wide error. Lowering-time variants
//! ([`Error::Schema`], [`Error::UnsupportedType`]) are fatal and raised before
//! any argument is examined; the remaining variants describe problems with a
//! particular invocation and are reported to the user as usage errors.
//!
//! [`ParseError`] is the narrower failure produced by an
//! [`Instantiator`](crate::Instantiator) when raw tokens do not have the
//! expected shape.

use thiserror::Error;

/// Errors raised while resolving a schema, lowering it or assembling a value.
#[derive(Debug, Error)]
pub enum Error {
    /// A field type could not be resolved (unbound type variable, malformed
    /// generic application, unknown or recursive type reference).
    #[error("schema error at `{path}`: {message}")]
    Schema { path: String, message: String },

    /// A field type has no instantiator and no default to fall back on.
    #[error(
        "unsupported type annotation for the field `{path}` ({reason}). To suppress this error, assign the field a default value"
    )]
    UnsupportedType { path: String, reason: String },

    /// Tokens supplied for a field could not be converted.
    #[error("invalid value for `{flag}`: {source}")]
    Parse {
        flag: String,
        #[source]
        source: ParseError,
    },

    /// A union selector was not supplied and the field has no default variant.
    #[error("missing subcommand for `{path}`, expected one of: {}", choices.join(", "))]
    MissingSubcommand { path: String, choices: Vec<String> },

    /// A flag belongs to a variant that was not selected.
    #[error("unrecognized argument `{flag}`: it belongs to {}, which was not selected", owners.join(", "))]
    WrongVariantField { flag: String, owners: Vec<String> },

    /// A required value was never supplied.
    #[error("the following argument is required: {flag}")]
    MissingArgument { flag: String },

    /// A serialized value does not have the shape of its type.
    #[error("cannot decode `{path}`: {message}")]
    Decode { path: String, message: String },

    /// Internal consistency check failed.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// YAML (de)serialization failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a schema document or configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by the arguments of one invocation
    /// rather than by the schema itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::Error;
    ///
    /// let err = Error::MissingArgument { flag: "--x".into() };
    /// assert!(err.is_usage());
    /// assert!(!Error::Invariant("oops".into()).is_usage());
    /// ```
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::MissingSubcommand { .. }
                | Self::WrongVariantField { .. }
                | Self::MissingArgument { .. }
        )
    }
}

/// Failure of an instantiator to convert raw tokens into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token is not a valid spelling of the expected primitive.
    #[error("`{token}` is not a valid {expected}")]
    InvalidToken { token: String, expected: String },

    /// A token is not one of the allowed values.
    #[error("`{token}` is not a valid choice, expected one of: {}", choices.join(", "))]
    InvalidChoice { token: String, choices: Vec<String> },

    /// The number of tokens does not match the expected arity.
    #[error("expected {expected} token(s), found {found}")]
    WrongCount { expected: String, found: usize },

    /// None of the alternatives of a union accepted the tokens.
    #[error("no alternative of {metavar} accepts `{}`", tokens.join(" "))]
    NoMatchingAlternative { tokens: Vec<String>, metavar: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
