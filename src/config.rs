//! Engine configuration.
//!
//! Configuration can be built in code or loaded from YAML:
//!
//! ```yaml
//! concurrent: true
//! context:
//!   factor: 1.5
//!   env: prod
//! ```

use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::context::{Context, ContextBuilder};
use crate::error::{CombineError, Result};

/// Settings applied when constructing a [`Combine`](crate::Combine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombineConfig {
    /// Run the handlers of different functions concurrently.
    #[serde(default)]
    pub concurrent: bool,

    /// Context handed to every handler invocation.
    #[serde(default)]
    pub context: Context,
}

impl CombineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or has an invalid format
    ///
    /// # Example
    /// ```ignore
    /// use combine::CombineConfig;
    ///
    /// let config = CombineConfig::load_from_file("combine.yaml")?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        tracing::debug!("Loaded combine config from {}", path.display());
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
            .map_err(|e| CombineError::Config(format!("Failed to parse YAML: {}", e)))
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_builder(self, builder: ContextBuilder) -> Self {
        self.with_context(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CombineConfig::default();
        assert!(!config.concurrent);
        assert!(config.context.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
concurrent: true
context:
  factor: 1.5
  env: prod
  regions: [ap-northeast-1, us-east-1]
"#;
        let config = CombineConfig::from_yaml_str(yaml).unwrap();
        assert!(config.concurrent);
        assert_eq!(config.context.get_f64("factor"), Some(1.5));
        assert_eq!(config.context.get_str("env"), Some("prod"));
        assert!(config.context.get("regions").unwrap().is_array());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = CombineConfig::from_yaml_str("concurrent: true").unwrap();
        assert!(config.concurrent);
        assert!(config.context.is_empty());

        assert_eq!(CombineConfig::from_yaml_str("  \n").unwrap(), CombineConfig::default());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = CombineConfig::from_yaml_str("parallel: true").unwrap_err();
        assert!(matches!(err, CombineError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "context:\n  env: test").unwrap();

        let config = CombineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.context.get_str("env"), Some("test"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CombineConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, CombineError::Io(_)));
    }

    #[test]
    fn test_builders() {
        let config = CombineConfig::default()
            .with_concurrent(true)
            .with_context_builder(Context::builder().set("env", "prod"));
        assert!(config.concurrent);
        assert_eq!(config.context.get_str("env"), Some("prod"));
    }
}
