//! Command-line interface for bs

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::command::{Globals, Session};
use crate::config::GlobalOverrides;
use crate::logger::LogLevel;

mod api;
mod config;
mod format;
mod lint;
mod rollup;

/// Resolve a `--flag`/`--no-flag` pair, `None` when neither was given
pub(crate) fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Flags accepted by every command
#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Path to the bs config file.
    #[arg(long, global = true, value_name = "path", help_heading = "Global")]
    pub config: Option<PathBuf>,

    /// Set the minimum log level to log.
    #[arg(long, alias = "log-level", global = true, value_enum, help_heading = "Global")]
    pub loglevel: Option<LogLevel>,

    /// Format output as json.
    #[arg(long, global = true, help_heading = "Global")]
    pub json: bool,

    /// Toggle build related tasks.
    #[arg(long, global = true, overrides_with = "no_build", help_heading = "Global")]
    pub build: bool,

    #[arg(long, global = true, overrides_with = "build", hide = true)]
    pub no_build: bool,

    /// Use the dev build of your library.
    #[arg(long, global = true, help_heading = "Global")]
    pub dev: bool,

    /// Use the prod build of your library.
    #[arg(long, global = true, conflicts_with = "dev", help_heading = "Global")]
    pub prod: bool,

    /// Toggle jsdoc/wiki related tasks.
    #[arg(long, global = true, overrides_with = "no_docs", help_heading = "Global")]
    pub docs: bool,

    #[arg(long, global = true, overrides_with = "docs", hide = true)]
    pub no_docs: bool,

    /// Toggle rollup related tasks.
    #[arg(long, global = true, overrides_with = "no_rollup", help_heading = "Global")]
    pub rollup: bool,

    #[arg(long, global = true, overrides_with = "rollup", hide = true)]
    pub no_rollup: bool,

    /// Disable build and rollup related tasks.
    #[arg(long, alias = "nbr", global = true, help_heading = "Global")]
    pub no_build_or_rollup: bool,

    /// Disable logging from external tooling.
    #[arg(long, alias = "silent", global = true, overrides_with = "no_silence", help_heading = "Global")]
    pub silence: bool,

    #[arg(long, alias = "no-silent", global = true, overrides_with = "silence", hide = true)]
    pub no_silence: bool,

    /// Toggle stack trace logging for errors.
    #[arg(long, alias = "trace", global = true, overrides_with = "no_stacktrace", help_heading = "Global")]
    pub stacktrace: bool,

    #[arg(long, alias = "no-trace", global = true, overrides_with = "stacktrace", hide = true)]
    pub no_stacktrace: bool,

    /// Force toggle TTY exclusive behaviors.
    #[arg(long, global = true, overrides_with = "no_tty", help_heading = "Global")]
    pub tty: bool,

    #[arg(long, global = true, overrides_with = "tty", hide = true)]
    pub no_tty: bool,
}

impl GlobalArgs {
    /// Overrides to apply on top of the loaded config
    pub fn overrides(&self) -> GlobalOverrides {
        let mut overrides = GlobalOverrides {
            build: toggle(self.build, self.no_build),
            dev: self.dev.then_some(true),
            docs: toggle(self.docs, self.no_docs),
            json: self.json.then_some(true),
            log_level: self.loglevel,
            rollup: toggle(self.rollup, self.no_rollup),
            silence: toggle(self.silence, self.no_silence),
            trace: toggle(self.stacktrace, self.no_stacktrace),
            tty: toggle(self.tty, self.no_tty),
        };

        if self.prod {
            overrides.dev = Some(false);
        }

        if self.no_build_or_rollup {
            overrides.build = Some(false);
            overrides.rollup = Some(false);
        }

        overrides
    }

    pub fn globals(&self) -> Globals {
        Globals {
            config: self.config.clone(),
            overrides: self.overrides(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the config file and its schema
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Check or fix formatting with prettier (fixes when run directly)
    Format {
        #[command(subcommand)]
        command: Option<FormatCommands>,
    },

    /// Check or fix lint issues with eslint (fixes when run directly)
    Lint {
        #[command(subcommand)]
        command: Option<LintCommands>,
    },

    /// Export and compare the public API
    #[command(subcommand)]
    Api(ApiCommands),

    /// Generate the rollup file (generates when run directly)
    Rollup {
        #[command(subcommand)]
        command: Option<RollupCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create a config file for the CLI
    Create(config::CreateArgs),

    /// Save a local json schema of the config file
    Schema(config::SchemaArgs),

    /// Scaffold the schema and config file for the CLI
    Init(config::InitArgs),

    /// Reset the config file to the default settings
    Reset(config::ResetArgs),

    /// Update your config file and the config json schema
    Update(config::UpdateArgs),
}

#[derive(Subcommand)]
pub enum FormatCommands {
    /// Run prettier and output any files that need formatting
    #[command(alias = "validate")]
    Check(format::CheckArgs),

    /// Run prettier and fix any formatting issues
    Fix(format::FixArgs),
}

#[derive(Subcommand)]
pub enum LintCommands {
    /// Run eslint and output any issues
    #[command(alias = "validate")]
    Check(lint::CheckArgs),

    /// Run eslint and fix any fixable issues
    Fix(lint::FixArgs),
}

#[derive(Subcommand)]
pub enum ApiCommands {
    /// Export the public API to a single `api.md` file
    #[command(aliases = ["extract", "create"])]
    Export(api::ExportArgs),

    /// Update the public API file
    #[command(aliases = ["refresh", "save"])]
    Update(api::UpdateArgs),

    /// Generate a diff of the current public API
    #[command(alias = "changes")]
    Diff(api::DiffArgs),

    /// Throw an error if there's any pending changes to the public API
    #[command(alias = "validate")]
    Check(api::CheckArgs),

    /// Generate a report file dictating any pending public API changes
    Report(api::ReportArgs),
}

#[derive(Subcommand)]
pub enum RollupCommands {
    /// Generate a single `.d.ts` file representing the API
    #[command(aliases = ["create", "run"])]
    Generate(rollup::GenerateArgs),
}

/// Run a parsed command, returning the process exit code
pub fn execute(session: &Session, command: Commands, globals: &GlobalArgs) -> i32 {
    let globals = globals.globals();

    match command {
        Commands::Config(command) => match command {
            ConfigCommands::Create(args) => session.launch(&config::CreateCommand, &globals, args),
            ConfigCommands::Schema(args) => session.launch(&config::SchemaCommand, &globals, args),
            ConfigCommands::Init(args) => session.launch(&config::InitCommand, &globals, args),
            ConfigCommands::Reset(args) => session.launch(&config::ResetCommand, &globals, args),
            ConfigCommands::Update(args) => session.launch(&config::UpdateCommand, &globals, args),
        },
        Commands::Format { command } => match command {
            Some(FormatCommands::Check(args)) => session.launch(&format::CheckCommand, &globals, args),
            Some(FormatCommands::Fix(args)) => session.launch(&format::FixCommand, &globals, args),
            None => session.launch(&format::FixCommand, &globals, format::FixArgs::default()),
        },
        Commands::Lint { command } => match command {
            Some(LintCommands::Check(args)) => session.launch(&lint::CheckCommand, &globals, args),
            Some(LintCommands::Fix(args)) => session.launch(&lint::FixCommand, &globals, args),
            None => session.launch(&lint::FixCommand, &globals, lint::FixArgs::default()),
        },
        Commands::Api(command) => match command {
            ApiCommands::Export(args) => session.launch(&api::ExportCommand, &globals, args),
            ApiCommands::Update(args) => session.launch(&api::UpdateCommand, &globals, args),
            ApiCommands::Diff(args) => session.launch(&api::DiffCommand, &globals, args),
            ApiCommands::Check(args) => session.launch(&api::CheckCommand, &globals, args),
            ApiCommands::Report(args) => session.launch(&api::ReportCommand, &globals, args),
        },
        Commands::Rollup { command } => match command {
            Some(RollupCommands::Generate(args)) => session.launch(&rollup::GenerateCommand, &globals, args),
            None => session.launch(&rollup::GenerateCommand, &globals, rollup::GenerateArgs::default()),
        },
    }
}
