//! Command lifecycle
//!
//! Every command runs through a [`Session`], which owns the state shared by
//! a top-level command and any commands it invokes: the config store, the
//! output channel, and the memoized build/dependency state.
//!
//! A top-level command goes through [`Session::launch`]: the config is
//! loaded and CLI overrides applied, the command runs, and its result (or
//! error) is rendered. Commands started from inside another command go
//! through [`CommandContext::invoke`] instead, which reuses the live config
//! and demotes their log output.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use serde::Serialize;

use crate::config::{Config, ConfigStore, GlobalOverrides};
use crate::error::{AppError, Result};
use crate::logger::{LogLevel, LogSettings, OutputChannel, Theme};
use crate::package::{self, Dependency};
use crate::process::{self, IntoArgs, ProcessOutput};

/// Environment variable that forces JSON output when set to `json`
pub const CONTENT_TYPE_ENV: &str = "BS_CONTENT_TYPE";

/// Name of the binary, used when referring to commands in messages
pub const BIN_NAME: &str = "bs";

/// A command that can be launched from the CLI or invoked by another command
pub trait Command {
    /// Arguments specific to this command
    type Args: Parser;

    /// Result of a successful run, printed as JSON in JSON mode
    type Output: Serialize;

    /// Space separated command path, like `config create`
    const ID: &'static str;

    /// Whether JSON mode is honored
    const JSON: bool = true;

    fn run(&self, cx: &CommandContext<'_>, args: Self::Args) -> anyhow::Result<Self::Output>;
}

/// Options shared by every top-level invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Globals {
    /// Explicit config file to load
    pub config: Option<PathBuf>,

    /// Values merged onto the `global` config section
    pub overrides: GlobalOverrides,
}

/// State shared across a top-level command and everything it invokes
#[derive(Debug)]
pub struct Session {
    store: ConfigStore,
    output: OutputChannel,
    theme: RefCell<Theme>,
    content_type: Option<String>,
    overrides: RefCell<GlobalOverrides>,
    config_path: RefCell<Option<PathBuf>>,
    init_ran: Cell<bool>,
    build_ran: Cell<bool>,
    dependencies: RefCell<Option<Rc<Vec<Dependency>>>>,
}

impl Session {
    pub fn new(store: ConfigStore, output: OutputChannel) -> Self {
        Self {
            store,
            output,
            theme: RefCell::new(Theme::default()),
            content_type: None,
            overrides: RefCell::new(GlobalOverrides::default()),
            config_path: RefCell::new(None),
            init_ran: Cell::new(false),
            build_ran: Cell::new(false),
            dependencies: RefCell::new(None),
        }
    }

    /// Session over the real stdio, reading the content type from the environment
    pub fn from_env() -> Self {
        Self::new(ConfigStore::new(), OutputChannel::stdio())
            .with_content_type(std::env::var(CONTENT_TYPE_ENV).ok())
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    #[cfg(test)]
    pub fn with_dependencies(self, dependencies: Vec<Dependency>) -> Self {
        *self.dependencies.borrow_mut() = Some(Rc::new(dependencies));
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.store
    }

    /// Run `command` as a top-level command, returning the process exit code
    ///
    /// If a command already started in this session, this behaves like a
    /// nested invocation: config loading and overrides are skipped.
    pub fn launch<C: Command>(&self, command: &C, globals: &Globals, args: C::Args) -> i32 {
        let nested = self.init_ran.replace(true);
        if !nested {
            *self.overrides.borrow_mut() = globals.overrides.clone();
        }

        let cx = CommandContext {
            session: self,
            id: C::ID,
            nested,
            json_flag: C::JSON,
        };

        tracing::debug!("Launching `{}` (nested: {})", C::ID, nested);

        let result = cx
            .init(globals)
            .and_then(|_| command.run(&cx, args))
            .and_then(|output| cx.render(&output));

        match result {
            Ok(()) => 0,
            Err(e) => cx.catch(e),
        }
    }
}

/// What a running command sees of its session
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    session: &'a Session,
    id: &'static str,
    nested: bool,
    json_flag: bool,
}

impl CommandContext<'_> {
    /// A copy of the live config
    pub fn config(&self) -> Config {
        self.session.config().get()
    }

    /// Read from the live config without copying it
    pub fn with_config<R>(&self, read: impl FnOnce(&Config) -> R) -> R {
        self.session.config().with(read)
    }

    /// Config file given with `--config` to the top-level command
    pub fn config_path(&self) -> Option<PathBuf> {
        self.session.config_path.borrow().clone()
    }

    fn init(&self, globals: &Globals) -> anyhow::Result<()> {
        if self.nested {
            return Ok(());
        }

        let store = self.session.config();
        let loaded = store.load(globals.config.as_deref())?;
        store.replace(loaded);
        store.update(globals.overrides.clone().into_patch())?;
        *self.session.config_path.borrow_mut() = globals.config.clone();
        self.refresh_theme();

        tracing::debug!("Config initialized for `{}`", self.id);
        Ok(())
    }

    fn refresh_theme(&self) {
        let theme = self.with_config(|config| Theme::from_config(&config.theme));
        *self.session.theme.borrow_mut() = theme;
    }

    /// Whether `path` is the config file this session was loaded from
    pub fn is_active_config(&self, path: &Path) -> bool {
        match self.config_path() {
            Some(active) => active == path,
            None => self.session.config().default_path() == path,
        }
    }

    /// Go back to the default config, keeping the command line overrides
    pub fn reset_config(&self) -> Result<()> {
        let store = self.session.config();
        store.reset();
        store.update(self.session.overrides.borrow().clone().into_patch())?;
        self.refresh_theme();

        Ok(())
    }

    /// Write the live config to `path`
    ///
    /// Returns `false` without writing when the file exists and `overwrite`
    /// isn't set.
    pub fn save_config(&self, path: &Path, overwrite: bool) -> Result<bool> {
        if path.exists() && !overwrite {
            return Ok(false);
        }

        self.session.config().save(Some(path))?;
        Ok(true)
    }

    /// Whether the result should be rendered as a single JSON document
    pub fn json_enabled(&self) -> bool {
        if !self.json_flag {
            return false;
        }

        let forced = self
            .session
            .content_type
            .as_deref()
            .is_some_and(|content_type| content_type.eq_ignore_ascii_case("json"));

        // `--json` reaches the config only once loading succeeds
        let flagged = self.session.overrides.borrow().json == Some(true);

        forced || flagged || self.with_config(|config| config.global.json == Some(true))
    }

    fn log_settings(&self) -> LogSettings {
        let json = self.json_enabled();
        self.with_config(|config| LogSettings {
            min_level: config.global.log_level,
            json,
            tty: config.global.tty,
        })
    }

    /// Emit a message at `level`
    pub fn send(&self, level: LogLevel, message: impl AsRef<str>) {
        self.session.output.send(
            &self.session.theme.borrow(),
            self.log_settings(),
            self.nested,
            level,
            message.as_ref(),
        );
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.send(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.send(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.send(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.send(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.send(LogLevel::Error, message);
    }

    /// Inline reference to another command, for messages and suggestions
    pub fn name_of(&self, id: &str) -> String {
        format!("`{} {}`", BIN_NAME, id)
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| {
            AppError::extend("Failed to serialize command output", e, Vec::<String>::new())
        })?;

        self.session.output.write_out(&format!("{}\n", json), None);
        Ok(())
    }

    fn render<T: Serialize>(&self, output: &T) -> anyhow::Result<()> {
        if self.json_enabled() {
            self.print_json(output)?;
        }
        Ok(())
    }

    /// Report a failed command, returning the exit code to terminate with
    fn catch(&self, error: anyhow::Error) -> i32 {
        let error = AppError::extend_if_needed(error);
        tracing::debug!("`{}` failed: {:?}", self.id, error);

        if self.json_enabled() {
            if let Err(e) = self.print_json(&error.to_json()) {
                tracing::warn!("{}", e);
            }
        } else {
            let show_stack = self.with_config(|config| config.global.trace);
            self.error(error.to_display_string(show_stack));
        }

        i32::from(error.process_exit_code())
    }

    /// Run another command from inside this one
    ///
    /// `argv` holds the child's own arguments only. The child reuses the
    /// live config and its log output is demoted. Its errors come back to
    /// the caller instead of being reported.
    pub fn invoke<C: Command>(&self, command: &C, argv: impl IntoArgs) -> Result<C::Output> {
        let argv = argv.into_args();
        tracing::debug!("Invoking `{}` from `{}` with {:?}", C::ID, self.id, argv);

        let args = C::Args::try_parse_from(std::iter::once(C::ID.to_string()).chain(argv))
            .map_err(|e| {
                AppError::extend(
                    format!("Invalid arguments for {}", self.name_of(C::ID)),
                    e,
                    Vec::<String>::new(),
                )
                .with_exit_code(2)
            })?;

        let child = CommandContext {
            session: self.session,
            id: C::ID,
            nested: true,
            json_flag: C::JSON,
        };

        command.run(&child, args).map_err(AppError::extend_if_needed)
    }

    fn silenced(&self, silence: Option<bool>) -> bool {
        let configured = self.with_config(|config| config.global.silence);
        silence.unwrap_or(configured) || self.json_enabled()
    }

    /// Run an external program, failing on a nonzero exit code
    ///
    /// `silence` overrides `global.silence`. JSON mode always silences.
    pub fn run(&self, program: &str, args: impl IntoArgs, silence: Option<bool>) -> Result<String> {
        process::run(program, &args.into_args(), self.silenced(silence))
    }

    /// Run an external program without failing on its exit code
    pub fn execute(
        &self,
        program: &str,
        args: impl IntoArgs,
        silence: Option<bool>,
    ) -> Result<ProcessOutput> {
        process::execute(program, &args.into_args(), self.silenced(silence))
    }

    fn package_manager(&self) -> String {
        self.with_config(|config| config.global.package_manager.clone())
    }

    /// Run the configured package manager
    pub fn pnpm(&self, args: impl IntoArgs, silence: Option<bool>) -> Result<String> {
        self.run(&self.package_manager(), args, silence)
    }

    /// Run the configured package manager without failing on its exit code
    pub fn pnpm_execute(&self, args: impl IntoArgs, silence: Option<bool>) -> Result<ProcessOutput> {
        self.execute(&self.package_manager(), args, silence)
    }

    /// Build the library, dev or prod depending on `global.dev`
    pub fn build(&self, force: bool) -> Result<()> {
        if self.with_config(|config| config.global.dev) {
            self.build_dev(force)
        } else {
            self.build_prod(force)
        }
    }

    pub fn build_dev(&self, force: bool) -> Result<()> {
        self.trace("Building dev library");
        self.run_build(force, "build:dev")?;
        self.trace("Dev library built");
        Ok(())
    }

    pub fn build_prod(&self, force: bool) -> Result<()> {
        self.trace("Building library");
        self.run_build(force, "build")?;
        self.trace("Library built");
        Ok(())
    }

    fn run_build(&self, force: bool, script: &str) -> Result<()> {
        if !self.with_config(|config| config.global.build) {
            self.debug("Skipping build step since builds are disabled");
            return Ok(());
        }

        if !force && self.session.build_ran.get() {
            self.debug("Skipping build step since library was already built");
            return Ok(());
        }

        self.pnpm(script, None)?;
        self.session.build_ran.set(true);

        Ok(())
    }

    /// Local and global dependencies, fetched once per session
    pub fn dependencies(&self) -> Result<Rc<Vec<Dependency>>> {
        if let Some(dependencies) = self.session.dependencies.borrow().as_ref() {
            return Ok(Rc::clone(dependencies));
        }

        let dependencies = Rc::new(package::fetch_dependencies(&self.package_manager())?);
        *self.session.dependencies.borrow_mut() = Some(Rc::clone(&dependencies));

        Ok(dependencies)
    }

    pub fn find_dependency(&self, name: &str) -> Result<Option<Dependency>> {
        let dependencies = self.dependencies()?;
        Ok(package::find_dependency(&dependencies, name).cloned())
    }

    /// Fail unless `name` is installed locally or globally
    pub fn validate_package_installed(&self, name: &str) -> Result<()> {
        if self.find_dependency(name)?.is_some() {
            return Ok(());
        }

        Err(AppError::new(format!("Missing required package: {}", name))
            .with_suggestion(format!("Run `pnpm add {}` to install the package", name)))
    }
}
