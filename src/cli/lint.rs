//! Lint commands, backed by eslint

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use serde_json::Value;

use super::toggle;
use crate::command::{Command, CommandContext};
use crate::error::AppError;
use crate::flags::FlagBuilder;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintOutput {
    pub message: String,

    /// eslint's own json report, only present in JSON mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
}

/// Sum of errors and warnings across an eslint json report
fn count_issues(report: &Value) -> u64 {
    report
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|result| {
                    result["errorCount"].as_u64().unwrap_or(0)
                        + result["warningCount"].as_u64().unwrap_or(0)
                })
                .sum()
        })
        .unwrap_or(0)
}

#[derive(Parser, Debug, Default)]
pub struct CheckArgs {
    /// Only check changed files.
    #[arg(long, overrides_with = "no_cache")]
    pub cache: bool,

    #[arg(long, overrides_with = "cache", hide = true)]
    pub no_cache: bool,

    /// Path to the eslint config file.
    #[arg(short, long, value_name = "path")]
    pub eslint: Option<String>,

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
    type Output = LintOutput;
    const ID: &'static str = "lint check";

    fn run(&self, cx: &CommandContext<'_>, args: CheckArgs) -> Result<LintOutput> {
        cx.info("Checking source files with eslint");

        cx.validate_package_installed("eslint")?;

        let config = cx.config().lint;
        let mut patterns = if args.pattern.is_empty() {
            config.patterns
        } else {
            args.pattern
        };
        let config_path = args.eslint.or(config.config);
        let cache = toggle(args.cache, args.no_cache).unwrap_or(config.cache);
        let json = cx.json_enabled();

        if patterns.is_empty() {
            cx.debug("No pattern specified, running against all files instead");
            patterns.push(".".to_string());
        } else {
            cx.debug(format!("Using patterns: {}", patterns.join(", ")));
        }

        let mut flags = FlagBuilder::default();

        if let Some(path) = &config_path {
            cx.debug(format!("Using eslint config file: {}", path));
            flags = flags.add("config", Some(path));
        }

        if cache {
            cx.debug("Only checking changed files");
            flags = flags.add("cache", None);
        }

        if args.fix {
            cx.debug("Fixing any fixable issues");
            flags = flags.add("fix", None);
        }

        if json {
            flags = flags.add("format", Some(&"json"));
        }

        let mut argv = vec!["exec".to_string(), "eslint".to_string()];
        argv.extend(patterns);
        argv.extend(flags.unpack());

        cx.trace("Running eslint");

        // eslint exits with 1 when it finds problems, anything else is a crash
        let result = cx.pnpm_execute(argv, None)?;
        let (output, failed) = match result.exit_code {
            0 => (result.stdout, false),
            1 => (result.stdout, true),
            _ => return Err(result.into_error().into()),
        };

        let message = if args.fix {
            "There are issues that couldn't be automatically fixed"
        } else {
            "There are issues found by eslint that need fixing"
        };

        if json {
            let report: Value = serde_json::from_str(&output).map_err(|e| {
                AppError::extend("Failed to parse the eslint report", e, Vec::<String>::new())
            })?;

            let issues = count_issues(&report);
            cx.trace(format!("Found {} issues", issues));

            let message = if issues == 0 {
                "No issues to report."
            } else {
                message
            };

            return Ok(LintOutput {
                message: message.to_string(),
                report: Some(report),
            });
        }

        if !failed && output.trim().is_empty() {
            cx.info("No remaining eslint issues to report.");
            return Ok(LintOutput {
                message: "No issues to report.".to_string(),
                report: None,
            });
        }

        cx.warning(&output);

        let suggestions = if args.fix {
            Vec::new()
        } else {
            vec![format!("Try running {}", cx.name_of("lint fix"))]
        };

        Err(AppError::new(message).with_suggestions(suggestions).into())
    }
}

#[derive(Parser, Debug, Default)]
pub struct FixArgs {}

pub struct FixCommand;

impl Command for FixCommand {
    type Args = FixArgs;
    type Output = LintOutput;
    const ID: &'static str = "lint fix";

    fn run(&self, cx: &CommandContext<'_>, _args: FixArgs) -> Result<LintOutput> {
        cx.info("Fixing any fixable eslint issues");

        let result = cx.invoke(&CheckCommand, ["--fix"])?;
        cx.info(&result.message);

        Ok(result)
    }
}
