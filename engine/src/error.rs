//! Error type returned by the `argschema` entry points.

use thiserror::Error;

/// Errors returned while building a parser or parsing arguments.
#[derive(Debug, Error)]
pub enum CliError {
    /// The schema cannot be lowered, or an internal check failed.
    #[error(transparent)]
    Schema(#[from] argschema_core::Error),

    /// The arguments were rejected; also carries `--help` and `--version`
    /// output.
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// The assembled value does not deserialize into the requested type.
    #[error("cannot convert the parsed value: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Usage errors follow clap (`2`, or `0` for help and version output);
    /// everything else exits with `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(err) => err.exit_code(),
            _ => 1,
        }
    }

    /// Prints the error and exits the process.
    pub fn exit(&self) -> ! {
        match self {
            Self::Usage(err) => err.exit(),
            other => {
                eprintln!("error: {other}");
                std::process::exit(other.exit_code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_errors_exit_with_one() {
        let err = CliError::from(argschema_core::Error::Invariant("broken".into()));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "internal invariant violated: broken");
    }

    #[test]
    fn test_usage_errors_keep_clap_exit_code() {
        let err = CliError::from(clap::Error::new(clap::error::ErrorKind::InvalidValue));
        assert_eq!(err.exit_code(), 2);
    }
}
