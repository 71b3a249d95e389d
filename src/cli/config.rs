//! Config file commands

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use super::toggle;
use crate::command::{Command, CommandContext};
use crate::config::{Config, ConfigStore, DEFAULT_CONFIG_LOCATION};
use crate::error::AppError;
use crate::files::write_file_safe;
use crate::flags::FlagBuilder;

/// File name of the generated schema
pub const SCHEMA_FILE: &str = "bs-config-schema.json";

/// Result of a config command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOutput {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ConfigOutput {
    fn new(message: &str, path: Option<PathBuf>) -> Self {
        Self {
            message: message.to_string(),
            path,
        }
    }
}

fn ensure_dir(cx: &CommandContext<'_>, dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }

    cx.trace(format!("Creating directory: {}", dir.display()));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir.display()))
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Path to save the config file to.
    #[arg(long, value_name = "path", default_value = DEFAULT_CONFIG_LOCATION)]
    pub path: PathBuf,

    /// Overwrite the existing config file, if one already exists.
    #[arg(short, long, overrides_with = "no_force")]
    pub force: bool,

    #[arg(long, overrides_with = "force", hide = true)]
    pub no_force: bool,

    /// Throw an error if the config file already exists.
    #[arg(long, overrides_with = "no_exit", hide = true)]
    pub exit: bool,

    /// Don't fail if the config file already exists.
    #[arg(long, overrides_with = "exit")]
    pub no_exit: bool,

    /// Use your existing config to create a new prefilled one.
    #[arg(long, overrides_with = "no_preset")]
    pub preset: bool,

    #[arg(long, overrides_with = "preset", hide = true)]
    pub no_preset: bool,
}

pub struct CreateCommand;

impl Command for CreateCommand {
    type Args = CreateArgs;
    type Output = ConfigOutput;
    const ID: &'static str = "config create";

    fn run(&self, cx: &CommandContext<'_>, args: CreateArgs) -> Result<ConfigOutput> {
        cx.info("Creating a config file");

        let force = toggle(args.force, args.no_force).unwrap_or(false);
        let exit = toggle(args.exit, args.no_exit).unwrap_or(true);
        let preset = toggle(args.preset, args.no_preset).unwrap_or(false);

        if let Some(dir) = args.path.parent() {
            ensure_dir(cx, dir)?;
        }

        let written = if preset {
            cx.debug("Creating config file from the current config");
            cx.save_config(&args.path, force)?
        } else {
            let data = serde_json::to_string_pretty(&Config::default())
                .context("Failed to serialize the config")?;
            write_file_safe(&args.path, &data, force)?
        };

        if !written {
            if exit {
                return Err(AppError::new(format!(
                    "Config file already exists at path: {}",
                    args.path.display()
                ))
                .with_suggestion("Run with the -f flag to overwrite the config file.")
                .into());
            }

            cx.debug(format!("Config file already exists at path: {}", args.path.display()));
            return Ok(ConfigOutput::new("Config file already exists", None));
        }

        cx.debug(format!("Config file created: {}", args.path.display()));
        Ok(ConfigOutput::new("Config file created", Some(args.path)))
    }
}

#[derive(Parser, Debug)]
pub struct SchemaArgs {
    /// Output directory to save the schema file to.
    #[arg(short, long, value_name = "path", default_value = ".vscode")]
    pub output: PathBuf,
}

pub struct SchemaCommand;

impl Command for SchemaCommand {
    type Args = SchemaArgs;
    type Output = ConfigOutput;
    const ID: &'static str = "config schema";

    fn run(&self, cx: &CommandContext<'_>, args: SchemaArgs) -> Result<ConfigOutput> {
        cx.info("Saving json schema for config");

        ensure_dir(cx, &args.output)?;
        let path = args.output.join(SCHEMA_FILE);

        cx.trace(format!("Saving schema to file: {}", path.display()));
        ConfigStore::dump_schema(&path)?;

        Ok(ConfigOutput::new("Schema saved.", Some(path)))
    }
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to save the config file to.
    #[arg(long, value_name = "path")]
    pub path: Option<PathBuf>,

    /// Overwrite the existing config file, if one already exists.
    #[arg(short, long, overrides_with = "no_force", hide = true)]
    pub force: bool,

    /// Keep an existing config file.
    #[arg(long, overrides_with = "force")]
    pub no_force: bool,

    /// Use your existing config to create a new prefilled one.
    #[arg(long, overrides_with = "no_preset", hide = true)]
    pub preset: bool,

    /// Create the config file from the defaults only.
    #[arg(long, overrides_with = "preset")]
    pub no_preset: bool,
}

pub struct InitCommand;

impl Command for InitCommand {
    type Args = InitArgs;
    type Output = ConfigOutput;
    const ID: &'static str = "config init";

    fn run(&self, cx: &CommandContext<'_>, args: InitArgs) -> Result<ConfigOutput> {
        cx.info("Initializing configuration files");

        let path = args.path.or_else(|| cx.config_path());
        let create_flags = FlagBuilder::default()
            .add_negatable("force", toggle(args.force, args.no_force).or(Some(true)))
            .add_negatable("preset", toggle(args.preset, args.no_preset).or(Some(true)))
            .add_value_if_present("path", path.as_ref().map(|path| path.display()));

        cx.trace(format!("Running create with arguments: {}", create_flags));

        cx.invoke(&CreateCommand, create_flags.unpack())?;
        cx.invoke(&SchemaCommand, Vec::<String>::new())?;

        Ok(ConfigOutput::new("Config file and schema created.", path))
    }
}

#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Path to the config file.
    #[arg(long, value_name = "path", default_value = DEFAULT_CONFIG_LOCATION)]
    pub path: PathBuf,
}

pub struct ResetCommand;

impl Command for ResetCommand {
    type Args = ResetArgs;
    type Output = ConfigOutput;
    const ID: &'static str = "config reset";

    fn run(&self, cx: &CommandContext<'_>, args: ResetArgs) -> Result<ConfigOutput> {
        cx.info("Resetting the config file to the default settings");

        let flags = FlagBuilder::new(["force"]).add("path", Some(&args.path.display()));
        cx.invoke(&CreateCommand, flags.unpack())?;

        if cx.is_active_config(&args.path) {
            cx.debug("Resetting the live config to match");
            cx.reset_config()?;
        }

        cx.debug(format!("Config file reset: {}", args.path.display()));
        Ok(ConfigOutput::new("Config file reset", Some(args.path)))
    }
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Update your config file with the current values.
    #[arg(long, overrides_with = "no_update_config", hide = true)]
    pub update_config: bool,

    /// Leave the config file untouched.
    #[arg(long, overrides_with = "update_config")]
    pub no_update_config: bool,

    /// Update the schema with any changes.
    #[arg(long, overrides_with = "no_update_schema", hide = true)]
    pub update_schema: bool,

    /// Leave the schema file untouched.
    #[arg(long, overrides_with = "update_schema")]
    pub no_update_schema: bool,
}

pub struct UpdateCommand;

impl Command for UpdateCommand {
    type Args = UpdateArgs;
    type Output = ConfigOutput;
    const ID: &'static str = "config update";

    fn run(&self, cx: &CommandContext<'_>, args: UpdateArgs) -> Result<ConfigOutput> {
        cx.info("Updating configuration files");

        if toggle(args.update_config, args.no_update_config).unwrap_or(true) {
            cx.debug("Updating config file");

            let create_flags = FlagBuilder::new(["force", "preset"])
                .add_value_if_present("path", cx.config_path().as_ref().map(|path| path.display()));
            cx.invoke(&CreateCommand, create_flags.unpack())?;
        } else {
            cx.debug("Skipping config file update");
        }

        if toggle(args.update_schema, args.no_update_schema).unwrap_or(true) {
            cx.debug("Updating schema file");
            cx.invoke(&SchemaCommand, Vec::<String>::new())?;
        } else {
            cx.debug("Skipping schema file update");
        }

        Ok(ConfigOutput::new("Configuration files updated.", None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Globals, Session};
    use crate::config::GlobalOverrides;
    use crate::logger::{BufferSink, OutputChannel};
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        session: Session,
        stdout: BufferSink,
        stderr: BufferSink,
        dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let stdout = BufferSink::new();
        let stderr = BufferSink::new();
        let session = Session::new(
            ConfigStore::with_default_path(dir.path().join(DEFAULT_CONFIG_LOCATION)),
            OutputChannel::new(Box::new(stdout.clone()), Box::new(stderr.clone())),
        );

        Harness {
            session,
            stdout,
            stderr,
            dir,
        }
    }

    fn json() -> Globals {
        Globals {
            config: None,
            overrides: GlobalOverrides {
                json: Some(true),
                ..Default::default()
            },
        }
    }

    fn path_arg(path: &Path) -> String {
        format!("--path={}", path.display())
    }

    #[test]
    fn test_create_writes_defaults() {
        let h = harness();
        let path = h.dir.path().join("nested/dir/bs.config.json");

        let args = CreateArgs::parse_from(["create", path_arg(&path).as_str()]);
        assert_eq!(h.session.launch(&CreateCommand, &json(), args), 0);

        let written = Config::parse(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());

        let output: Value = serde_json::from_str(&h.stdout.contents()).unwrap();
        assert_eq!(output["message"], "Config file created");
    }

    #[test]
    fn test_create_refuses_to_overwrite() {
        let h = harness();
        let path = h.dir.path().join("bs.config.json");
        fs::write(&path, "{}").unwrap();

        let args = CreateArgs::parse_from(["create", path_arg(&path).as_str()]);
        assert_eq!(h.session.launch(&CreateCommand, &Globals::default(), args), 1);

        assert!(h.stderr.contents().contains("Config file already exists at path"));
        assert!(h.stderr.contents().contains("Run with the -f flag"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_create_no_exit() {
        let h = harness();
        let path = h.dir.path().join("bs.config.json");
        fs::write(&path, "{}").unwrap();

        let args = CreateArgs::parse_from(["create", path_arg(&path).as_str(), "--no-exit"]);
        assert_eq!(h.session.launch(&CreateCommand, &json(), args), 0);
        assert_eq!(h.stdout.contents(), "{\"message\":\"Config file already exists\"}\n");
    }

    #[test]
    fn test_create_force_with_preset() {
        let h = harness();
        let path = h.dir.path().join("bs.config.json");
        fs::write(&path, "{}").unwrap();

        let globals = Globals {
            config: None,
            overrides: GlobalOverrides {
                dev: Some(true),
                ..Default::default()
            },
        };
        let args = CreateArgs::parse_from(["create", path_arg(&path).as_str(), "-f", "--preset"]);
        assert_eq!(h.session.launch(&CreateCommand, &globals, args), 0);

        let written = Config::parse(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written.global.dev);
    }

    #[test]
    fn test_schema() {
        let h = harness();
        let output = h.dir.path().join(".vscode");

        let args = SchemaArgs::parse_from(["schema", "-o", output.to_str().unwrap()]);
        assert_eq!(h.session.launch(&SchemaCommand, &Globals::default(), args), 0);

        let schema: Value =
            serde_json::from_str(&fs::read_to_string(output.join(SCHEMA_FILE)).unwrap()).unwrap();
        assert!(schema["properties"]["api"].is_object());
    }

    #[test]
    fn test_reset_overwrites() {
        let h = harness();
        let path = h.dir.path().join("bs.config.json");
        fs::write(&path, r#"{ "global": { "dev": true } }"#).unwrap();

        let args = ResetArgs::parse_from(["reset", path_arg(&path).as_str()]);
        assert_eq!(h.session.launch(&ResetCommand, &Globals::default(), args), 0);

        let written = Config::parse(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
        assert!(!h.session.config().get().global.dev);
    }

    #[test]
    fn test_reset_other_file_keeps_live_config() {
        let h = harness();
        fs::write(
            h.dir.path().join("bs.config.json"),
            r#"{ "global": { "dev": true } }"#,
        )
        .unwrap();
        let other = h.dir.path().join("other.json");

        let args = ResetArgs::parse_from(["reset", path_arg(&other).as_str()]);
        assert_eq!(h.session.launch(&ResetCommand, &Globals::default(), args), 0);

        assert!(other.exists());
        assert!(h.session.config().get().global.dev);
    }

    #[test]
    fn test_update_can_skip_everything() {
        let h = harness();

        let args = UpdateArgs::parse_from(["update", "--no-update-config", "--no-update-schema"]);
        assert_eq!(h.session.launch(&UpdateCommand, &json(), args), 0);

        assert_eq!(
            h.stdout.contents(),
            "{\"message\":\"Configuration files updated.\"}\n"
        );
        assert_eq!(fs::read_dir(h.dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_nested_create_failure_propagates() {
        let h = harness();
        let path = h.dir.path().join("bs.config.json");
        fs::write(&path, "{}").unwrap();

        // Reset always forces, so point it at a directory to make the write fail
        let args = ResetArgs::parse_from(["reset", path_arg(h.dir.path()).as_str()]);
        assert_eq!(h.session.launch(&ResetCommand, &Globals::default(), args), 1);
        assert!(h.stderr.contents().contains("Failed to write file at path"));
    }
}
