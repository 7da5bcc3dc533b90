use clap::crate_name;
use colorful::Colorful;
pub use ::log::{debug, error, info, warn, Level};
use ::log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Stderr logger for the generator: one colored line per record, filtered
/// to this workspace's own crates.
pub struct SimpleLogger {
    max_level: Level,
}

impl SimpleLogger {
    pub fn new() -> Self {
        Self {
            max_level: Level::Info,
        }
    }

    pub fn with_level(mut self, max_level: Level) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn init(self) -> Result<(), SetLoggerError> {
        ::log::set_max_level(LevelFilter::Debug);
        ::log::set_boxed_logger(Box::new(self))
    }

    /// The driver logs under its binary target (`protog`), the compiler
    /// library under its crate name; both share the package prefix.
    /// Everything else (dependencies) is muted.
    fn workspace_target(target: &str) -> bool {
        let root = target.split("::").next().unwrap_or(target);
        let prefix = crate_name!().split('-').next().unwrap_or(crate_name!());
        root.starts_with(prefix)
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level && Self::workspace_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warn".yellow().bold(),
            Level::Info => "info".light_blue().bold(),
            Level::Debug => "debug".blue().bold(),
            Level::Trace => "trace".magenta().bold(),
        };
        eprintln!("{}: {}", prefix, record.args());
    }

    fn flush(&self) {}
}
