//! Formatting commands, backed by prettier

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use super::toggle;
use crate::command::{Command, CommandContext};
use crate::error::AppError;
use crate::flags::FlagBuilder;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatOutput {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Files listed by `prettier --list-different`
fn parse_file_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Parser, Debug, Default)]
pub struct CheckArgs {
    /// Only check changed files.
    #[arg(long, overrides_with = "no_cache")]
    pub cache: bool,

    #[arg(long, overrides_with = "cache", hide = true)]
    pub no_cache: bool,

    /// Path to the prettier config file.
    #[arg(long, value_name = "path")]
    pub prettier: Option<String>,

    /// Pattern to use in finding files to run against.
    #[arg(short, long, value_name = "string")]
    pub pattern: Vec<String>,

    /// Automatically fix any issues.
    #[arg(long, hide = true)]
    pub fix: bool,
}

pub struct CheckCommand;

impl Command for CheckCommand {
    type Args = CheckArgs;
    type Output = FormatOutput;
    const ID: &'static str = "format check";

    fn run(&self, cx: &CommandContext<'_>, args: CheckArgs) -> Result<FormatOutput> {
        cx.info("Checking source files with prettier");

        cx.validate_package_installed("prettier")?;

        let config = cx.config().format;
        let mut patterns = if args.pattern.is_empty() {
            config.patterns
        } else {
            args.pattern
        };
        let config_path = args.prettier.or(config.config);
        let cache = toggle(args.cache, args.no_cache).unwrap_or(config.cache);

        if patterns.is_empty() {
            cx.debug("No pattern specified, running against all files instead");
            patterns.push(".".to_string());
        } else {
            cx.debug(format!("Using patterns: {}", patterns.join(", ")));
        }

        let mut flags = FlagBuilder::new(["list-different"]);

        if let Some(path) = &config_path {
            cx.debug(format!("Using config file: {}", path));
            flags = flags.add("config", Some(path));
        }

        if cache {
            cx.debug("Only checking changed files");
            flags = flags.add("cache", None);
        }

        if args.fix {
            cx.debug("Fixing any formatting issues");
            flags = flags.add("write", None);
        }

        let mut argv = vec!["prettier".to_string()];
        argv.extend(patterns);
        argv.extend(flags.unpack());

        // prettier exits with 1 when files differ
        let result = cx.pnpm_execute(argv, None)?;
        let listing = match result.exit_code {
            0 | 1 => result.stdout,
            _ => return Err(result.into_error().into()),
        };

        let files = parse_file_list(&listing);

        if files.is_empty() {
            cx.info("All files are properly formatted");
            return Ok(FormatOutput {
                message: "All files are properly formatted".to_string(),
                files,
            });
        }

        if args.fix {
            for file in &files {
                cx.debug(format!("Formatted file: {}", file));
            }

            return Ok(FormatOutput {
                message: format!("Formatted {} file(s)", files.len()),
                files,
            });
        }

        if cx.json_enabled() {
            return Ok(FormatOutput {
                message: "There are files that need formatting".to_string(),
                files,
            });
        }

        for file in &files {
            cx.warning(file);
        }

        Err(AppError::new(format!(
            "There are {} file(s) that need formatting",
            files.len()
        ))
        .with_suggestion(format!("Try running {}", cx.name_of("format fix")))
        .into())
    }
}

#[derive(Parser, Debug, Default)]
pub struct FixArgs {}

pub struct FixCommand;

impl Command for FixCommand {
    type Args = FixArgs;
    type Output = FormatOutput;
    const ID: &'static str = "format fix";

    fn run(&self, cx: &CommandContext<'_>, _args: FixArgs) -> Result<FormatOutput> {
        cx.info("Fixing any formatting issues");

        let result = cx.invoke(&CheckCommand, ["--fix"])?;
        cx.info(&result.message);

        Ok(result)
    }
}
