//! Parser presentation settings.
//!
//! Loaded from YAML on its own or embedded as the `program:` section of a
//! [`SchemaDocument`](crate::SchemaDocument).
//!
//! # Example YAML
//!
//! ```yaml
//! prog: train
//! about: Train a model.
//! version: "1.2.0"
//! strict_choices: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_prog() -> String {
    "cli".to_string()
}

fn default_strict_choices() -> bool {
    true
}

/// Settings for the generated parser.
///
/// # Examples
///
/// ```
/// use argschema_core::ParserConfig;
///
/// let config: ParserConfig = serde_yaml::from_str("about: Demo").unwrap();
/// assert_eq!(config.prog, "cli");
/// assert_eq!(config.about.as_deref(), Some("Demo"));
/// assert!(config.strict_choices);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Program name shown in usage lines.
    #[serde(default = "default_prog")]
    pub prog: String,
    /// Top-level description; overrides the root struct description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// Enables `--version` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Let the parser reject tokens outside an allowed-value set.
    #[serde(default = "default_strict_choices")]
    pub strict_choices: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            prog: default_prog(),
            about: None,
            version: None,
            strict_choices: default_strict_choices(),
        }
    }
}

impl ParserConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be read, or
    /// [`Yaml`](crate::Error::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
