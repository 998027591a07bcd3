use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FaultlineError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Static analysis settings
    pub analysis: AnalysisConfig,

    /// Runtime conversion settings
    pub conversion: ConversionConfig,

    /// Documentation emission settings
    pub docs: DocsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Source directories to index
    pub source_dirs: Vec<PathBuf>,

    /// Maximum call-graph traversal depth before truncating
    pub max_depth: usize,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,

    /// Additional error-type constructors treated as raise sites,
    /// e.g. "MyError::new"
    pub extra_raise_constructors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Include failure internals (message, type) in fallback responses.
    /// Off by default so unknown errors never leak internals.
    pub debug: bool,

    /// Log every conversion at warn level
    pub log_failures: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Render a representative example body per error code
    pub include_examples: bool,

    /// Codes merged into every operation's documentation,
    /// for error paths raised by infrastructure outside source reach
    pub extra_codes: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            source_dirs: vec![PathBuf::from("src")],
            max_depth: 10,
            max_file_size: 1024 * 1024, // 1MB
            extra_raise_constructors: vec![],
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_failures: true,
        }
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            include_examples: true,
            extra_codes: vec![],
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| FaultlineError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FaultlineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Faultline.toml", "faultline.toml", ".faultline.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.max_depth, 10);
        assert!(!config.conversion.debug);
        assert!(config.docs.include_examples);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Faultline.toml");

        let mut config = Config::default();
        config.analysis.max_depth = 4;
        config.docs.extra_codes = vec!["RATE_LIMITED".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.analysis.max_depth, 4);
        assert_eq!(loaded.docs.extra_codes, vec!["RATE_LIMITED".to_string()]);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[conversion]\ndebug = true\n").unwrap();
        assert!(config.conversion.debug);
        assert!(config.conversion.log_failures);
        assert_eq!(config.analysis.max_depth, 10);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Some("/does/not/exist.toml")).unwrap();
        assert_eq!(config.analysis.max_depth, Config::default().analysis.max_depth);
    }
}
