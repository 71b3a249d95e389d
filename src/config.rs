//! Configuration management for bs
//!
//! The config file is a JSON document (`bs.config.json` by default) with one
//! section per functional domain. Every field is optional and falls back to
//! the defaults below. Unknown sections and fields are rejected.
//!
//! The live configuration is held by a [`ConfigStore`], which is created
//! lazily on first access and can be replaced wholesale or deep-merged with
//! runtime overrides.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::files::{read_file_safe, write_atomic};
use crate::logger::{parse_color, LogLevel};

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_LOCATION: &str = "bs.config.json";

/// Configuration for the bs cli.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Configuration for global flags.
    pub global: GlobalConfig,

    /// Configuration for API related commands.
    pub api: ApiConfig,

    /// Configuration for wiki related commands.
    pub docs: DocsConfig,

    /// Configuration for format related commands.
    pub format: FormatConfig,

    /// Configuration for lint related commands.
    pub lint: LintConfig,

    /// Configuration for the local registry and related commands.
    pub registry: RegistryConfig,

    /// Configuration for release commands.
    pub release: ReleaseConfig,

    /// Configuration for test related commands.
    pub tests: TestsConfig,

    /// Colors used for console output.
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Toggle build related tasks.
    pub build: bool,

    /// Use the dev build of your library.
    pub dev: bool,

    /// Toggle jsdoc/wiki related tasks.
    pub docs: bool,

    /// Toggle JSON only responses.
    pub json: Option<bool>,

    /// Set the minimum log level to log.
    pub log_level: LogLevel,

    /// Toggle rollup related tasks.
    pub rollup: bool,

    /// Disable logging from external tooling.
    pub silence: bool,

    /// Toggle stack trace logging for errors.
    pub trace: bool,

    /// Force toggle TTY exclusive behaviors.
    pub tty: Option<bool>,

    /// Package manager binary used to run scripts and query dependencies.
    pub package_manager: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            build: true,
            dev: false,
            docs: true,
            json: None,
            log_level: LogLevel::Info,
            rollup: true,
            silence: true,
            trace: false,
            tty: None,
            package_manager: "pnpm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiConfig {
    /// Directory where <project>.api.md files will be stored.
    pub api_dir: String,

    /// Explicit path to an .api.md file to use.
    pub api_file: Option<String>,

    /// File to save API reports to.
    pub report: String,

    /// Path to the generated rollup.
    pub rollup: String,

    /// Root index file for the library.
    pub source: String,

    /// Configuration for rollup transformers.
    pub transformers: TransformersConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_dir: "./api".to_string(),
            api_file: None,
            report: "./api-diff.txt".to_string(),
            rollup: "./dist/index.d.ts".to_string(),
            source: "./src/index.ts".to_string(),
            transformers: TransformersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TransformersConfig {
    /// Combine module augmentations under the same namespace.
    pub combine_module_augmentations: bool,

    /// Remove the leading `$` from identifier names when present.
    pub fix_identifier_names: bool,

    /// Prepend the package documentation from the index file to the rollup file.
    pub package_docs: bool,
}

impl Default for TransformersConfig {
    fn default() -> Self {
        Self {
            combine_module_augmentations: true,
            fix_identifier_names: true,
            package_docs: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct DocsConfig {
    /// Folder containing *.api.json files from api-extractor.
    pub api_folder: String,

    /// Folder to store generated markdown files to.
    pub output: String,

    /// Path to the docs section of the wiki where API files are stored.
    pub wiki_path: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            api_folder: "./dist".to_string(),
            output: "./dist/docs".to_string(),
            wiki_path: "./wiki/docs/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FormatConfig {
    /// Only check changed files.
    pub cache: bool,

    /// Path to the prettier config file.
    pub config: Option<String>,

    /// Pattern to use in finding files to run against.
    pub patterns: Vec<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            cache: false,
            config: None,
            patterns: vec![".".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct LintConfig {
    /// Only check changed files.
    pub cache: bool,

    /// Path to the eslint config file.
    pub config: Option<String>,

    /// Pattern to use in finding files to run against.
    pub patterns: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            cache: false,
            config: None,
            patterns: vec![".".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Install and manage packages verdaccio/pm2 in the global space.
    pub global: bool,

    /// The host address to use for verdaccio.
    pub host: String,

    /// Start the server locally instead of through pm2.
    pub local: bool,

    /// Name to use for the pm2 app.
    pub name: String,

    /// Install pm2 with the package manager.
    pub pm2: bool,

    /// The port number to use for verdaccio.
    pub port: u16,

    /// Only route for packages under a specific scope.
    pub scope: String,

    /// Install verdaccio with the package manager.
    pub verdaccio: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            global: true,
            host: "0.0.0.0".to_string(),
            local: false,
            name: "verdaccio".to_string(),
            pm2: true,
            port: 4873,
            scope: "@rbxts".to_string(),
            verdaccio: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ReleaseConfig {
    /// Automatically push git tags after publishing.
    pub auto_push_tags: bool,

    /// Create a git tag when publishing the package.
    pub git_tags: bool,

    /// Ignore changes from a specific package.
    pub ignore_package: Option<String>,

    /// Publish to the local registry instead of the remote npm registry.
    pub local: bool,

    /// Create a snapshot release.
    pub snapshot: bool,

    /// NPM tag to use when publishing the package.
    pub tag: Option<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            auto_push_tags: false,
            git_tags: true,
            ignore_package: None,
            local: false,
            snapshot: false,
            tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TestsConfig {
    /// Log the result of the tests to the console.
    pub console: bool,

    /// Export a copy of the test report as a json file.
    pub json_report_path: String,

    /// Export a copy of the test report as a markdown file.
    pub markdown_report_path: String,

    /// Where to save the rbxl file generated from rojo to.
    pub rbxl_output_path: String,

    /// Rebuild the test files before running tests.
    pub rebuild: bool,

    /// Rojo project.json file to build with.
    pub rojo_project: String,

    /// Show passed tests in the console output.
    pub show_pass: bool,

    /// Show skipped tests in the console output.
    pub show_skip: bool,

    /// Directory with a lune script to invoke.
    pub tests_path: String,

    /// If all tests share a common category, trim it from the output.
    pub trim: bool,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            console: true,
            json_report_path: "./report.json".to_string(),
            markdown_report_path: "./report.md".to_string(),
            rbxl_output_path: "node_modules/@daymxn/bs/dist/assets/tests/test.rbxl".to_string(),
            rebuild: true,
            rojo_project: "./test.project.json".to_string(),
            show_pass: true,
            show_skip: true,
            tests_path: "node_modules/@daymxn/bs/dist/assets/tests/lune".to_string(),
            trim: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ThemeConfig {
    /// Colors for log messages.
    pub logging: LoggingThemeConfig,
}

/// Colors are `#rrggbb` hex codes or names like `red` and `redBright`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct LoggingThemeConfig {
    /// Color of debug messages.
    #[serde(deserialize_with = "color_name")]
    pub debug: String,

    /// Color of error messages.
    #[serde(deserialize_with = "color_name")]
    pub error: String,

    /// Color of info messages.
    #[serde(deserialize_with = "color_name")]
    pub info: String,

    /// Color of the brackets around the log level.
    #[serde(deserialize_with = "color_name")]
    pub symbols: String,

    /// Color of trace messages.
    #[serde(deserialize_with = "color_name")]
    pub trace: String,

    /// Color of warning messages.
    #[serde(deserialize_with = "color_name")]
    pub warning: String,
}

impl Default for LoggingThemeConfig {
    fn default() -> Self {
        Self {
            debug: "#238a51".to_string(),
            error: "redBright".to_string(),
            info: "#4cc6ff".to_string(),
            symbols: "#727272".to_string(),
            trace: "#a3a3a3".to_string(),
            warning: "#e4bc50".to_string(),
        }
    }
}

fn color_name<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    parse_color(&name).map_err(de::Error::custom)?;
    Ok(name)
}

/// Runtime overrides for the `global` section, derived from CLI flags
///
/// Unset fields are left out of the patch entirely, so they never clobber
/// values coming from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
}

impl GlobalOverrides {
    /// Build a partial config document suitable for [`ConfigStore::update`]
    pub fn into_patch(self) -> Value {
        let mut patch = Map::new();
        patch.insert(
            "global".to_string(),
            serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new())),
        );
        Value::Object(patch)
    }
}

/// A single problem found while validating a config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path to the offending field (`api.port`)
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        let path = if path.is_empty() { "<root>" } else { path };
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every issue found in a config document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssues(pub Vec<ConfigIssue>);

impl fmt::Display for ConfigIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for ConfigIssues {}

type FieldValidator = fn(&str, &Value, &mut Vec<ConfigIssue>);

/// A schema section that can be validated field by field
trait Section: DeserializeOwned {
    /// Validator for a field holding a nested section
    fn nested(_field: &str) -> Option<FieldValidator> {
        None
    }
}

impl Section for Config {
    fn nested(field: &str) -> Option<FieldValidator> {
        match field {
            "global" => Some(validate_section::<GlobalConfig>),
            "api" => Some(validate_section::<ApiConfig>),
            "docs" => Some(validate_section::<DocsConfig>),
            "format" => Some(validate_section::<FormatConfig>),
            "lint" => Some(validate_section::<LintConfig>),
            "registry" => Some(validate_section::<RegistryConfig>),
            "release" => Some(validate_section::<ReleaseConfig>),
            "tests" => Some(validate_section::<TestsConfig>),
            "theme" => Some(validate_section::<ThemeConfig>),
            _ => None,
        }
    }
}

impl Section for ApiConfig {
    fn nested(field: &str) -> Option<FieldValidator> {
        match field {
            "transformers" => Some(validate_section::<TransformersConfig>),
            _ => None,
        }
    }
}

impl Section for ThemeConfig {
    fn nested(field: &str) -> Option<FieldValidator> {
        match field {
            "logging" => Some(validate_section::<LoggingThemeConfig>),
            _ => None,
        }
    }
}

impl Section for GlobalConfig {}
impl Section for LoggingThemeConfig {}
impl Section for TransformersConfig {}
impl Section for DocsConfig {}
impl Section for FormatConfig {}
impl Section for LintConfig {}
impl Section for RegistryConfig {}
impl Section for ReleaseConfig {}
impl Section for TestsConfig {}

/// Check each field of a section in isolation, so that every bad field is
/// reported instead of only the first one serde trips over.
fn validate_section<T: Section>(path: &str, value: &Value, issues: &mut Vec<ConfigIssue>) {
    let Some(object) = value.as_object() else {
        issues.push(ConfigIssue::new(
            path,
            format!("expected an object, received {}", value_kind(value)),
        ));
        return;
    };

    for (key, field) in object {
        let field_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };

        if let Some(nested) = T::nested(key) {
            nested(&field_path, field, issues);
            continue;
        }

        let mut single = Map::new();
        single.insert(key.clone(), field.clone());

        if let Err(e) = serde_json::from_value::<T>(Value::Object(single)) {
            issues.push(ConfigIssue::new(&field_path, e.to_string()));
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Config {
    /// Validate a JSON document against the schema
    ///
    /// All issues are collected and reported together; nothing is returned
    /// unless the whole document is valid.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut issues = Vec::new();
        validate_section::<Config>("", &value, &mut issues);

        if issues.is_empty() {
            match serde_json::from_value(value) {
                Ok(config) => return Ok(config),
                Err(e) => issues.push(ConfigIssue::new("", e.to_string())),
            }
        }

        let issues = ConfigIssues(issues);
        Err(AppError::new(format!("Config failed validation:\n{}", issues)).with_cause(issues))
    }

    /// Parse and validate the contents of a config file
    pub fn parse(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents).map_err(|e| {
            AppError::extend(
                "Failed to decode config file to JSON. Is the syntax correct?",
                e,
                Vec::<String>::new(),
            )
        })?;

        Self::from_value(value)
    }

    /// JSON schema describing the config file
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

/// Recursively merge `patch` into `target`
///
/// Objects are merged key by key; any other value in `patch` replaces the
/// value in `target` outright.
pub fn merge_values(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Holder of the live configuration
///
/// The value is built on first access (from defaults only) unless a config
/// was explicitly loaded or replaced before that.
#[derive(Debug)]
pub struct ConfigStore {
    default_path: PathBuf,
    value: RefCell<Option<Config>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::with_default_path(DEFAULT_CONFIG_LOCATION)
    }

    /// Create a store that resolves a missing `--config` to `path`
    pub fn with_default_path(path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: path.into(),
            value: RefCell::new(None),
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    /// Read from the live config, initializing it on first access
    ///
    /// `read` may read the config again, but must not replace it.
    pub fn with<R>(&self, read: impl FnOnce(&Config) -> R) -> R {
        if self.value.borrow().is_none() {
            tracing::debug!("Config accessed before it was loaded, using defaults");
            *self.value.borrow_mut() = Some(Config::default());
        }

        match self.value.borrow().as_ref() {
            Some(config) => read(config),
            None => read(&Config::default()),
        }
    }

    /// A copy of the live config
    pub fn get(&self) -> Config {
        self.with(Config::clone)
    }

    pub fn replace(&self, config: Config) {
        *self.value.borrow_mut() = Some(config);
    }

    /// Go back to the schema defaults
    pub fn reset(&self) {
        self.replace(Config::default());
    }

    /// Load a config file
    ///
    /// An explicit `path` that can't be found is an error. Without a path the
    /// default location is tried, and a missing file silently yields the
    /// defaults. Only an explicitly loaded file replaces the live config.
    pub fn load(&self, path: Option<&Path>) -> Result<Config> {
        let target = path.unwrap_or(&self.default_path);
        tracing::debug!("Loading config from {}", target.display());

        let contents = read_file_safe(target).map_err(|e| {
            AppError::extend(
                format!("Failed to load config file at path: {}", target.display()),
                e,
                Vec::<String>::new(),
            )
        })?;

        let Some(contents) = contents else {
            if let Some(path) = path {
                return Err(AppError::new(format!(
                    "Invalid config file path specified: {}",
                    path.display()
                ))
                .with_suggestion("Run `bs config create` to create one."));
            }

            tracing::debug!("No config file found, using defaults");
            return Ok(Config::default());
        };

        let config = Config::parse(&contents)?;

        if path.is_some() {
            self.replace(config.clone());
        }

        Ok(config)
    }

    /// Deep-merge a partial config document onto the live config
    ///
    /// The merged document is validated before it replaces the live value,
    /// so an invalid patch leaves the store untouched.
    pub fn update(&self, partial: Value) -> Result<Config> {
        let mut merged = serde_json::to_value(self.get()).map_err(|e| {
            AppError::extend("Failed to serialize the current config", e, Vec::<String>::new())
        })?;

        merge_values(&mut merged, partial);

        let config = Config::from_value(merged)?;
        self.replace(config.clone());

        Ok(config)
    }

    /// Write the live config as pretty JSON, returning the path written to
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let target = path.unwrap_or(&self.default_path).to_path_buf();
        let contents = serde_json::to_string_pretty(&self.get()).map_err(|e| {
            AppError::extend("Failed to serialize the current config", e, Vec::<String>::new())
        })?;

        write_atomic(&target, &contents)?;
        tracing::debug!("Saved config to {}", target.display());

        Ok(target)
    }

    /// Write the JSON schema of the config file, for editor autocompletion
    pub fn dump_schema(path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(&Config::schema()).map_err(|e| {
            AppError::extend("Failed to serialize the config schema", e, Vec::<String>::new())
        })?;

        write_atomic(path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ConfigStore {
        ConfigStore::with_default_path(dir.join(DEFAULT_CONFIG_LOCATION))
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert!(config.global.build);
        assert!(!config.global.dev);
        assert!(config.global.silence);
        assert_eq!(config.global.json, None);
        assert_eq!(config.global.log_level, LogLevel::Info);
        assert_eq!(config.global.package_manager, "pnpm");
        assert_eq!(config.registry.port, 4873);
        assert_eq!(config.lint.patterns, vec!["."]);
        assert!(config.api.transformers.package_docs);
    }

    #[test]
    fn test_parse_partial_document() {
        let config = Config::parse(r#"{ "global": { "dev": true }, "registry": { "port": 5000 } }"#).unwrap();

        assert!(config.global.dev);
        assert!(config.global.build);
        assert_eq!(config.registry.port, 5000);
        assert_eq!(config.registry.host, "0.0.0.0");
    }

    #[test]
    fn test_parse_reports_field_path() {
        let err = Config::parse(r#"{ "api": { "port": "abc" } }"#).unwrap_err();
        assert!(err.message().contains("api.port"), "{}", err.message());

        let err = Config::parse(r#"{ "registry": { "port": "abc" } }"#).unwrap_err();
        assert!(err.message().contains("registry.port"), "{}", err.message());
        assert!(err.message().contains("invalid type"), "{}", err.message());
    }

    #[test]
    fn test_parse_aggregates_issues() {
        let err = Config::parse(
            r#"{ "global": { "dev": "yes", "logLevel": "loud" }, "api": { "transformers": { "packageDocs": 1 } } }"#,
        )
        .unwrap_err();

        let message = err.message();
        assert!(message.starts_with("Config failed validation:"));
        assert!(message.contains("global.dev"));
        assert!(message.contains("global.logLevel"));
        assert!(message.contains("api.transformers.packageDocs"));
    }

    #[test]
    fn test_parse_rejects_unknown_section() {
        let err = Config::parse(r#"{ "unknown": {} }"#).unwrap_err();
        assert!(err.message().contains("unknown: unknown field"), "{}", err.message());

        let err = Config::parse(r#"{ "global": 5 }"#).unwrap_err();
        assert!(err.message().contains("global: expected an object"));

        let err = Config::parse("[]").unwrap_err();
        assert!(err.message().contains("<root>"));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = Config::parse("{ not json").unwrap_err();
        assert!(err.message().contains("Failed to decode config file to JSON"));
    }

    #[test]
    fn test_lazy_defaults() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        assert_eq!(store.get(), Config::default());
        assert!(store.with(|config| config.global.build));
    }

    #[test]
    fn test_nested_reads() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        let port = store.with(|outer| store.with(|inner| outer.registry.port + inner.registry.port));
        assert_eq!(port, 4873 * 2);
    }

    #[test]
    fn test_theme_colors_validated() {
        let config = Config::parse(r##"{ "theme": { "logging": { "info": "green", "debug": "#fff" } } }"##).unwrap();
        assert_eq!(config.theme.logging.info, "green");
        assert_eq!(config.theme.logging.error, "redBright");

        let err = Config::parse(r#"{ "theme": { "logging": { "warning": "purple" } } }"#).unwrap_err();
        assert!(err.message().contains("theme.logging.warning"), "{}", err.message());
        assert!(err.message().contains("unknown color: purple"), "{}", err.message());
    }

    #[test]
    fn test_load_explicit_missing_path() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        let missing = temp.path().join("missing.json");

        let err = store.load(Some(&missing)).unwrap_err();
        assert!(err.message().contains("Invalid config file path specified"));
        assert!(err.message().contains("missing.json"));
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn test_load_implicit_missing_falls_back() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        assert_eq!(store.load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_explicit_replaces_store() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        let path = temp.path().join("custom.json");
        fs::write(&path, r#"{ "global": { "dev": true } }"#).unwrap();

        let loaded = store.load(Some(&path)).unwrap();
        assert!(loaded.global.dev);
        assert!(store.get().global.dev);
    }

    #[test]
    fn test_load_implicit_does_not_replace_store() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        fs::write(store.default_path(), r#"{ "global": { "dev": true } }"#).unwrap();

        let loaded = store.load(None).unwrap();
        assert!(loaded.global.dev);
        assert!(!store.get().global.dev);
    }

    #[test]
    fn test_load_invalid_file_leaves_store() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{ "api": { "port": "abc" } }"#).unwrap();

        assert!(store.load(Some(&path)).is_err());
        assert_eq!(store.get(), Config::default());
    }

    #[test]
    fn test_update_deep_merges() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.update(json!({ "global": { "dev": true } })).unwrap();
        let config = store.update(json!({ "global": { "build": false } })).unwrap();

        assert!(config.global.dev);
        assert!(!config.global.build);
        assert_eq!(store.get(), config);
    }

    #[test]
    fn test_update_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        let patch = json!({ "lint": { "patterns": ["src"] }, "global": { "tty": false } });

        let once = store.update(patch.clone()).unwrap();
        let twice = store.update(patch).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.lint.patterns, vec!["src"]);
        assert_eq!(twice.global.tty, Some(false));
    }

    #[test]
    fn test_update_rejects_invalid_patch() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        let err = store.update(json!({ "registry": { "port": -1 } })).unwrap_err();
        assert!(err.message().contains("registry.port"));
        assert_eq!(store.get(), Config::default());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());

        store.update(json!({ "global": { "dev": true } })).unwrap();
        store.reset();

        assert_eq!(store.get(), Config::default());
    }

    #[test]
    fn test_global_overrides_patch() {
        let overrides = GlobalOverrides {
            dev: Some(true),
            log_level: Some(LogLevel::Warning),
            ..Default::default()
        };

        assert_eq!(
            overrides.into_patch(),
            json!({ "global": { "dev": true, "logLevel": "warning" } })
        );
        assert_eq!(GlobalOverrides::default().into_patch(), json!({ "global": {} }));
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = tempdir().unwrap();
        let store = store_in(temp.path());
        store
            .update(json!({ "global": { "json": true }, "release": { "tag": "next" } }))
            .unwrap();

        let path = store.save(None).unwrap();
        assert_eq!(path, store.default_path());

        let other = store_in(temp.path());
        let loaded = other.load(Some(&path)).unwrap();
        assert_eq!(loaded, store.get());
    }

    #[test]
    fn test_dump_schema() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bs-config-schema.json");

        ConfigStore::dump_schema(&path).unwrap();

        let schema: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(schema["properties"]["global"].is_object());
        assert!(schema.to_string().contains("Set the minimum log level to log."));
    }

    #[test]
    fn test_merge_values() {
        let mut target = json!({ "a": { "b": 1, "c": [1, 2] }, "d": true });
        merge_values(&mut target, json!({ "a": { "c": [3] }, "e": null }));

        assert_eq!(target, json!({ "a": { "b": 1, "c": [3] }, "d": true, "e": null }));
    }
}
