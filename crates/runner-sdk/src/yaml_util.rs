// Generic structured-document decoding.
// YAML is a superset of JSON, so one decode path serves both formats.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Failure to turn a document into a typed value.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,

    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// YAML / JSON decoding helpers.
pub struct YamlUtil;

impl YamlUtil {
    /// Decode `text` into any deserializable type.
    pub fn parse<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read `path` and decode its content.
    pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}
