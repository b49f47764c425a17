//! Configuration file support for notetex CLI
//!
//! Loads settings from `_notetex.toml` configuration file.

use anyhow::{Context, Result};
use notetex_core::CalloutConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "_notetex.toml";

/// Schema URL for the configuration file
pub const SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/notetex/notetex/main/crates/notetex-cli/schema/notetex.schema.json";

/// Root configuration structure
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Callout environment mapping
    #[serde(skip_serializing_if = "CalloutsConfig::is_empty")]
    pub callouts: CalloutsConfig,
    /// Rendering of blocks the callout rewriter has no rule for
    #[serde(skip_serializing_if = "RenderConfig::is_empty")]
    pub render: RenderConfig,
    /// Drawing export configuration
    #[serde(skip_serializing_if = "ExportConfig::is_empty")]
    pub export: ExportConfig,
}

/// Callout environment mapping
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct CalloutsConfig {
    /// Environment for callout kinds without a mapping (default: "calloutbox")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
    /// Callout kind to environment name, e.g. `NOTE = "notebox"`.
    /// Kinds are case-insensitive. Entries override the built-in table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environments: Option<BTreeMap<String, String>>,
    /// Start from an empty table instead of the built-in one (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_builtin: Option<bool>,
}

impl CalloutsConfig {
    fn is_empty(&self) -> bool {
        self.default_environment.is_none()
            && self.environments.is_none()
            && self.replace_builtin.is_none()
    }

    /// Build the environment mapping used by the rewriter
    pub fn to_callout_config(&self) -> CalloutConfig {
        let base = if self.replace_builtin.unwrap_or(false) {
            CalloutConfig::new(notetex_core::DEFAULT_ENVIRONMENT)
        } else {
            CalloutConfig::builtin()
        };
        let base = match &self.default_environment {
            Some(env) => base.with_default_environment(env.as_str()),
            None => base,
        };
        self.environments
            .iter()
            .flatten()
            .fold(base, |config, (kind, env)| {
                config.with_environment(kind, env.as_str())
            })
    }
}

/// Converter for blocks inside callouts that have no dedicated rule
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    /// Built-in LaTeX writer
    #[default]
    Builtin,
    /// Run `pandoc -f json -t latex` for each block
    Pandoc,
}

/// Block rendering configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct RenderConfig {
    /// Converter for other blocks: "builtin" or "pandoc" (default: "builtin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter: Option<ConverterKind>,
    /// Path to the pandoc executable (default: "pandoc")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pandoc: Option<PathBuf>,
}

impl RenderConfig {
    fn is_empty(&self) -> bool {
        self.converter.is_none() && self.pandoc.is_none()
    }
}

/// Drawing export configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ExportConfig {
    /// Command that renders a drawing and prints the render result as JSON.
    /// The drawing path is appended as the last argument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_command: Option<Vec<String>>,
    /// Fall back to the preview embedded in the drawing file when the render
    /// command is missing or fails (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    /// Re-export even when the PNG is newer than the drawing (default: false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

impl ExportConfig {
    fn is_empty(&self) -> bool {
        self.render_command.is_none() && self.fallback.is_none() && self.force.is_none()
    }
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Try to load configuration from a directory (looks for `_notetex.toml`)
    ///
    /// Returns `Ok(None)` if the config file doesn't exist.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate JSON schema for the configuration
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Generate JSON schema as a string
    pub fn json_schema_string() -> Result<String> {
        let schema = Self::json_schema();
        serde_json::to_string_pretty(&schema).context("Failed to serialize JSON schema")
    }

    /// Serialize configuration to TOML string with schema directive
    pub fn to_toml_with_schema(&self) -> Result<String> {
        let toml_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        Ok(format!("#:schema {}\n\n{}", SCHEMA_URL, toml_content))
    }

    /// Create a sample configuration with common defaults for init command
    pub fn sample() -> Self {
        Config {
            callouts: CalloutsConfig {
                default_environment: Some(notetex_core::DEFAULT_ENVIRONMENT.to_string()),
                environments: Some(BTreeMap::from([
                    ("NOTE".to_string(), "notebox".to_string()),
                    ("WARNING".to_string(), "warningbox".to_string()),
                ])),
                replace_builtin: Some(false),
            },
            render: RenderConfig {
                converter: Some(ConverterKind::Builtin),
                pandoc: None, // found on PATH
            },
            export: ExportConfig {
                render_command: None, // user should specify
                fallback: Some(true),
                force: Some(false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.callouts.default_environment.is_none());
        assert!(config.render.converter.is_none());
        assert!(config.export.render_command.is_none());
    }

    #[test]
    fn test_parse_callouts_section() {
        let config: Config = toml::from_str(
            r#"
            [callouts]
            default_environment = "genericbox"

            [callouts.environments]
            note = "mynote"
            THEOREM = "theorembox"
            "#,
        )
        .unwrap();

        let callouts = config.callouts.to_callout_config();
        assert_eq!(callouts.resolve("NOTE"), "mynote");
        assert_eq!(callouts.resolve("theorem"), "theorembox");
        // Built-in entries survive unless replaced
        assert_eq!(callouts.resolve("warning"), "warningbox");
        assert_eq!(callouts.resolve("unknown"), "genericbox");
    }

    #[test]
    fn test_replace_builtin() {
        let config: Config = toml::from_str(
            r#"
            [callouts]
            replace_builtin = true

            [callouts.environments]
            TIP = "tipbox"
            "#,
        )
        .unwrap();

        let callouts = config.callouts.to_callout_config();
        assert_eq!(callouts.resolve("tip"), "tipbox");
        assert_eq!(callouts.resolve("warning"), "calloutbox");
    }

    #[test]
    fn test_parse_render_section() {
        let config: Config = toml::from_str(
            r#"
            [render]
            converter = "pandoc"
            pandoc = "/opt/pandoc/bin/pandoc"
            "#,
        )
        .unwrap();

        assert_eq!(config.render.converter, Some(ConverterKind::Pandoc));
        assert_eq!(
            config.render.pandoc,
            Some(PathBuf::from("/opt/pandoc/bin/pandoc"))
        );
    }

    #[test]
    fn test_parse_export_section() {
        let config: Config = toml::from_str(
            r#"
            [export]
            render_command = ["node", "tldraw_convert.mjs"]
            fallback = false
            force = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.export.render_command,
            Some(vec!["node".to_string(), "tldraw_convert.mjs".to_string()])
        );
        assert_eq!(config.export.fallback, Some(false));
        assert_eq!(config.export.force, Some(true));
    }

    #[test]
    fn test_unknown_converter_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [render]
            converter = "typst"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[callouts]\ndefault_environment = \"box\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.callouts.default_environment, Some("box".to_string()));
    }

    #[test]
    fn test_serialize_empty_config() {
        let config = Config::default();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema"));
        // Empty config should have minimal content
        assert!(!toml.contains("[callouts]"));
    }

    #[test]
    fn test_serialize_sample_config() {
        let config = Config::sample();
        let toml = config.to_toml_with_schema().unwrap();
        assert!(toml.starts_with("#:schema"));
        assert!(toml.contains("[callouts]"));
        assert!(toml.contains("converter = \"builtin\""));
    }

    #[test]
    fn test_json_schema_generation() {
        let schema = Config::json_schema_string().unwrap();
        assert!(schema.contains("\"title\""));
        assert!(schema.contains("CalloutsConfig"));
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::sample();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(
            config.callouts.environments,
            parsed.callouts.environments
        );
        assert_eq!(config.render.converter, parsed.render.converter);
    }
}
