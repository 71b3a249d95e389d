//! Public API commands, backed by api-extractor
//!
//! `api diff` regenerates the `.api.md` file in place and compares it with a
//! backup of the committed one. The original file is always put back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use super::{rollup, toggle};
use crate::command::{Command, CommandContext};
use crate::error::AppError;
use crate::files::FileBackup;
use crate::flags::FlagBuilder;

const API_EXTRACTOR: &str = "@microsoft/api-extractor";
const API_FILE_SUFFIX: &str = ".api.md";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOutput {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
}

impl ApiOutput {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            report_file: None,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Enable verbose logging for api-extractor.
    #[arg(short, long)]
    pub verbose: bool,
}

pub struct ExportCommand;

impl Command for ExportCommand {
    type Args = ExportArgs;
    type Output = ApiOutput;
    const ID: &'static str = "api export";

    fn run(&self, cx: &CommandContext<'_>, args: ExportArgs) -> Result<ApiOutput> {
        cx.info("Exporting public API");

        if args.verbose {
            cx.debug("Enabling verbose logging for api-extractor");
        }
        let flags = FlagBuilder::new(["local"]).add_if("verbose", args.verbose);

        cx.validate_package_installed(API_EXTRACTOR)?;

        let mut argv = vec!["api-extractor".to_string(), "run".to_string()];
        argv.extend(flags.unpack());
        cx.pnpm(argv, None)?;

        Ok(ApiOutput::new("Public API exported."))
    }
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {}

pub struct UpdateCommand;

impl Command for UpdateCommand {
    type Args = UpdateArgs;
    type Output = ApiOutput;
    const ID: &'static str = "api update";

    fn run(&self, cx: &CommandContext<'_>, _args: UpdateArgs) -> Result<ApiOutput> {
        cx.info("Updating public API file");

        cx.build_prod(false)?;
        cx.invoke(&rollup::GenerateCommand, Vec::<String>::new())?;
        cx.invoke(&ExportCommand, Vec::<String>::new())?;

        Ok(ApiOutput::new("Public API file updated."))
    }
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Exit with a non zero status whenever there's a diff.
    #[arg(short, long)]
    pub exit: bool,

    /// Path to the current `api.md` file.
    #[arg(short, long, value_name = "path")]
    pub input: Option<PathBuf>,

    /// Save diff output to a file.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,

    /// Print the diff to the console.
    #[arg(long, overrides_with = "no_print", hide = true)]
    pub print: bool,

    /// Don't print the diff to the console.
    #[arg(long, overrides_with = "print")]
    pub no_print: bool,

    /// Generate an API report, suitable for a GitHub comment, instead of a basic diff.
    #[arg(long)]
    pub report: bool,
}

pub struct DiffCommand;

impl Command for DiffCommand {
    type Args = DiffArgs;
    type Output = ApiOutput;
    const ID: &'static str = "api diff";

    fn run(&self, cx: &CommandContext<'_>, args: DiffArgs) -> Result<ApiOutput> {
        cx.info("Generating public API diff");

        cx.build_prod(false)?;
        cx.invoke(&rollup::GenerateCommand, Vec::<String>::new())?;

        let api = cx.config().api;
        let input = get_input(cx, args.input.clone().or(api.api_file.map(PathBuf::from)), Path::new(&api.api_dir))?;
        cx.debug(format!("Using API file: {}", input.display()));

        cx.trace("Creating backup file");
        let backup = FileBackup::create(&input)?;
        cx.trace(format!("Backup file created: {}", backup.backup_path().display()));

        let result = compare(cx, &args, &input, backup.backup_path(), PathBuf::from(api.report));

        cx.trace(format!("Restoring API file: {}", backup.original_path().display()));
        let restored = backup.restore();

        let output = result?;
        restored?;
        cx.trace("Backup file restored");

        Ok(output)
    }
}

#[derive(Parser, Debug, Default)]
pub struct CheckArgs {}

/// `api diff -e`
pub struct CheckCommand;

impl Command for CheckCommand {
    type Args = CheckArgs;
    type Output = ApiOutput;
    const ID: &'static str = "api check";

    fn run(&self, cx: &CommandContext<'_>, _args: CheckArgs) -> Result<ApiOutput> {
        cx.info("Checking the public API for changes");

        Ok(cx.invoke(&DiffCommand, ["-e"])?)
    }
}

#[derive(Parser, Debug, Default)]
pub struct ReportArgs {
    /// Exit with a non zero status whenever there's a diff.
    #[arg(short, long)]
    pub exit: bool,
}

/// `api diff --report --no-print`
pub struct ReportCommand;

impl Command for ReportCommand {
    type Args = ReportArgs;
    type Output = ApiOutput;
    const ID: &'static str = "api report";

    fn run(&self, cx: &CommandContext<'_>, args: ReportArgs) -> Result<ApiOutput> {
        cx.info("Checking the public API for changes");

        let flags = FlagBuilder::new(["report", "no-print"]).add_if("exit", args.exit);
        let result = cx.invoke(&DiffCommand, flags.unpack())?;

        if let Some(report_file) = &result.report_file {
            cx.warning(format!("API report file: {}", report_file.display()));
        }

        Ok(result)
    }
}

/// Export the current API over `input` and compare it against `backup`
fn compare(
    cx: &CommandContext<'_>,
    args: &DiffArgs,
    input: &Path,
    backup: &Path,
    default_report: PathBuf,
) -> Result<ApiOutput> {
    cx.invoke(&ExportCommand, Vec::<String>::new())?;

    let mut diff = generate_diff(cx, backup, input)?;
    if args.report {
        cx.debug("Creating API report");
        diff = generate_report(&diff, &cx.name_of("api update"));
    }

    if diff.is_empty() {
        cx.info("API is up-to-date, no diff found.");
        return Ok(ApiOutput::new("API is up-to-date, no diff found."));
    }

    let write_output = args.output.is_some() || args.report;
    let output_file = args.output.clone().unwrap_or(default_report);

    if write_output {
        cx.debug(format!("Writing API diff to file: {}", output_file.display()));
        fs::write(&output_file, &diff)
            .with_context(|| format!("Failed to write API diff to: {}", output_file.display()))?;
    }

    if toggle(args.print, args.no_print).unwrap_or(true) {
        cx.warning(format!("API changes were found\n{}", diff));
    }

    if args.exit {
        return Err(AppError::new("There are pending API changes.")
            .with_suggestion(format!(
                "If these changes are expected, run {} to update the API.",
                cx.name_of("api update")
            ))
            .into());
    }

    Ok(ApiOutput {
        message: "There are pending API changes.".to_string(),
        report_file: write_output.then_some(output_file),
    })
}

/// Resolve the `.api.md` file to compare against
fn get_input(cx: &CommandContext<'_>, explicit: Option<PathBuf>, api_dir: &Path) -> Result<PathBuf> {
    cx.debug("Getting current API file");

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(AppError::new(format!(
                "API file does not exist at the provided path: {}",
                path.display()
            ))
            .into());
        }

        cx.trace(format!("Using provided API file: {}", path.display()));
        return Ok(path);
    }

    cx.trace(format!(
        "No input file provided, searching for api file in dir: {}",
        api_dir.display()
    ));

    find_api_file(api_dir)?.ok_or_else(|| {
        AppError::new("Could not find an API file to diff against.")
            .with_suggestions([
                format!("Run {} to create one.", cx.name_of("api export")),
                "You can manually provide a path to an api file with the --input flag.".to_string(),
            ])
            .into()
    })
}

/// First `*.api.md` file in `dir`, by name
fn find_api_file(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read API directory: {}", dir.display()))
        }
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        let is_api_file = entry.file_name().to_string_lossy().ends_with(API_FILE_SUFFIX);

        if is_api_file && entry.file_type()?.is_file() {
            candidates.push(entry.path());
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn generate_diff(cx: &CommandContext<'_>, old: &Path, new: &Path) -> Result<String> {
    cx.debug("Finding diff between APIs");

    let argv = vec![
        "diff".to_string(),
        "--no-index".to_string(),
        old.display().to_string(),
        new.display().to_string(),
    ];

    let output = cx.execute("git", argv, None)?;

    // git exits with 1 when the files differ
    match output.exit_code {
        0 => Ok(String::new()),
        1 => Ok(strip_diff_preamble(&output.stdout).to_string()),
        _ => Err(AppError::extend(
            "Failed to run `git diff` to compare the APIs",
            output.into_error(),
            Vec::<String>::new(),
        )
        .into()),
    }
}

/// Drop anything printed before the first `diff` line
fn strip_diff_preamble(output: &str) -> &str {
    if output.starts_with("diff") {
        return output;
    }

    match output.find("\ndiff") {
        Some(index) => &output[index + 1..],
        None => output,
    }
}

fn generate_report(diff: &str, update_command: &str) -> String {
    if diff.is_empty() {
        return String::new();
    }

    format!(
        "Your change includes changes that impact the public API.\n\n\
         Please run {} to update the public API file.\n\n\
         **API Diff**\n\
         ```diff\n{}\n```\n",
        update_command, diff
    )
}
