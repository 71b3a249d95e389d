//! User facing output channel
//!
//! Messages are rendered as `[level]: message`, colored by the [`Theme`].
//! Warnings and errors go to stderr; everything else goes to stdout so it
//! can be piped. When the destination isn't a terminal (or TTY behavior is
//! forced off) escape codes are stripped before writing.
//!
//! This is separate from the `tracing` diagnostics, which are meant for
//! developers of bs itself and are controlled through `BS_LOG`.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

use clap::ValueEnum;
use colored::{Color, Colorize};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{LoggingThemeConfig, ThemeConfig};

/// Severity of a message, in increasing order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }

    /// Level used for a message coming from a nested invocation
    ///
    /// Everything below warning drops one step (bottoming out at trace).
    /// Warnings and errors keep their severity.
    pub fn demote(self) -> Self {
        match self {
            LogLevel::Trace | LogLevel::Debug => LogLevel::Trace,
            LogLevel::Info => LogLevel::Debug,
            LogLevel::Warning | LogLevel::Error => self,
        }
    }

    /// Whether a message at this level should be shown with `minimum` set
    pub fn passes(self, minimum: LogLevel) -> bool {
        self >= minimum
    }

    /// Whether messages at this level belong on stderr
    pub fn is_diagnostic(self) -> bool {
        self > LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Colors used for log lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingTheme {
    pub trace: Color,
    pub debug: Color,
    pub info: Color,
    pub warning: Color,
    pub error: Color,
    /// Color of the surrounding `[` `]:` symbols
    pub symbols: Color,
}

impl Default for LoggingTheme {
    fn default() -> Self {
        Self {
            trace: Color::TrueColor { r: 0xa3, g: 0xa3, b: 0xa3 },
            debug: Color::TrueColor { r: 0x23, g: 0x8a, b: 0x51 },
            info: Color::TrueColor { r: 0x4c, g: 0xc6, b: 0xff },
            warning: Color::TrueColor { r: 0xe4, g: 0xbc, b: 0x50 },
            error: Color::BrightRed,
            symbols: Color::TrueColor { r: 0x72, g: 0x72, b: 0x72 },
        }
    }
}

impl LoggingTheme {
    /// Theme described by the `theme.logging` config section
    ///
    /// Names that fail to parse keep the default color for that slot.
    pub fn from_config(config: &LoggingThemeConfig) -> Self {
        let defaults = Self::default();
        let pick = |name: &str, fallback: Color| parse_color(name).unwrap_or(fallback);

        Self {
            trace: pick(&config.trace, defaults.trace),
            debug: pick(&config.debug, defaults.debug),
            info: pick(&config.info, defaults.info),
            warning: pick(&config.warning, defaults.warning),
            error: pick(&config.error, defaults.error),
            symbols: pick(&config.symbols, defaults.symbols),
        }
    }

    pub fn color(&self, level: LogLevel) -> Color {
        match level {
            LogLevel::Trace => self.trace,
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }
}

/// Rendering theme shared by every command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Theme {
    pub logging: LoggingTheme,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Self {
        Self {
            logging: LoggingTheme::from_config(&config.logging),
        }
    }

    /// Render `[level]: message` with the theme colors applied
    pub fn format(&self, level: LogLevel, message: &str) -> String {
        let color = self.logging.color(level);
        let symbols = self.logging.symbols;

        format!(
            "{}{}{}{}",
            "[".color(symbols),
            level.as_str().color(color),
            "]: ".color(symbols),
            message.color(color)
        )
    }
}

/// Parse a color name from the theme config
///
/// Accepts `#rrggbb` (or `#rgb`) hex codes and chalk style names such as
/// `red`, `redBright` or `gray`.
pub fn parse_color(name: &str) -> std::result::Result<Color, String> {
    if let Some(hex) = name.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| format!("invalid hex color: {}", name));
    }

    let (base, bright) = match name.strip_suffix("Bright") {
        Some(base) => (base, true),
        None => (name, false),
    };

    let color = match (base, bright) {
        ("black", false) => Color::Black,
        ("black", true) | ("gray" | "grey", false) => Color::BrightBlack,
        ("red", false) => Color::Red,
        ("red", true) => Color::BrightRed,
        ("green", false) => Color::Green,
        ("green", true) => Color::BrightGreen,
        ("yellow", false) => Color::Yellow,
        ("yellow", true) => Color::BrightYellow,
        ("blue", false) => Color::Blue,
        ("blue", true) => Color::BrightBlue,
        ("magenta", false) => Color::Magenta,
        ("magenta", true) => Color::BrightMagenta,
        ("cyan", false) => Color::Cyan,
        ("cyan", true) => Color::BrightCyan,
        ("white", false) => Color::White,
        ("white", true) => Color::BrightWhite,
        _ => return Err(format!("unknown color: {}", name)),
    };

    Ok(color)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let full: String = match hex.len() {
        6 => hex.to_string(),
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        _ => return None,
    };

    let value = u32::from_str_radix(&full, 16).ok()?;
    Some(Color::TrueColor {
        r: (value >> 16) as u8,
        g: (value >> 8) as u8,
        b: value as u8,
    })
}

/// Always emit colors; [`OutputChannel`] strips them per destination
///
/// `NO_COLOR` is still honored.
pub fn init_colors() {
    if std::env::var_os("NO_COLOR").is_none() {
        colored::control::set_override(true);
    }
}

/// Remove ANSI escape sequences from `text`
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    static ANSI: OnceLock<Regex> = OnceLock::new();

    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI pattern is valid"))
        .replace_all(text, "")
}

/// Destination of an output stream
pub trait Sink: Write {
    fn is_terminal(&self) -> bool;
}

impl Sink for io::Stdout {
    fn is_terminal(&self) -> bool {
        IsTerminal::is_terminal(self)
    }
}

impl Sink for io::Stderr {
    fn is_terminal(&self) -> bool {
        IsTerminal::is_terminal(self)
    }
}

/// Settings that decide whether and how a message is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub min_level: LogLevel,
    /// JSON mode suppresses every log line
    pub json: bool,
    /// Forces TTY behavior on or off; `None` asks the sink
    pub tty: Option<bool>,
}

/// The pair of streams a command writes to
pub struct OutputChannel {
    stdout: RefCell<Box<dyn Sink>>,
    stderr: RefCell<Box<dyn Sink>>,
}

impl fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChannel").finish_non_exhaustive()
    }
}

impl OutputChannel {
    pub fn new(stdout: Box<dyn Sink>, stderr: Box<dyn Sink>) -> Self {
        Self {
            stdout: RefCell::new(stdout),
            stderr: RefCell::new(stderr),
        }
    }

    /// Channel over the process' real stdout and stderr
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Emit a leveled message
    ///
    /// `nested` demotes the level first (see [`LogLevel::demote`]); the
    /// result is then checked against the configured minimum.
    pub fn send(
        &self,
        theme: &Theme,
        settings: LogSettings,
        nested: bool,
        level: LogLevel,
        message: &str,
    ) {
        if settings.json {
            return;
        }

        let target = if nested { level.demote() } else { level };
        if !target.passes(settings.min_level) {
            return;
        }

        let line = format!("{}\n", theme.format(target, message));

        if target.is_diagnostic() {
            self.write_err(&line, settings.tty);
        } else {
            self.write_out(&line, settings.tty);
        }
    }

    pub fn write_out(&self, message: &str, tty: Option<bool>) {
        write_to(&self.stdout, message, tty);
    }

    pub fn write_err(&self, message: &str, tty: Option<bool>) {
        write_to(&self.stderr, message, tty);
    }
}

fn write_to(sink: &RefCell<Box<dyn Sink>>, message: &str, tty: Option<bool>) {
    let mut sink = sink.borrow_mut();
    let styled = tty.unwrap_or_else(|| sink.is_terminal());
    let text = if styled {
        Cow::Borrowed(message)
    } else {
        strip_ansi(message)
    };

    // A closed pipe on our own output isn't something a command can recover from
    if let Err(e) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
        tracing::debug!("Failed to write output: {}", e);
    }
}

/// In-memory sink for tests; clones share the same buffer
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: std::rc::Rc<RefCell<Vec<u8>>>,
    terminal: bool,
}

#[cfg(test)]
impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminal() -> Self {
        Self {
            terminal: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).to_string()
    }
}

#[cfg(test)]
impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Sink for BufferSink {
    fn is_terminal(&self) -> bool {
        self.terminal
    }
}
