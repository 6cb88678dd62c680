use std::fmt;

use clap::{ArgMatches, ValueEnum, builder::PossibleValue};

/// Minimum level of messages that will be logged
///
/// Ordered by increasing verbosity, with `None` switching logging off altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

const LEVELS: [(LogLevel, &str); 6] = [
    (LogLevel::None, "none"),
    (LogLevel::Error, "error"),
    (LogLevel::Warn, "warn"),
    (LogLevel::Info, "info"),
    (LogLevel::Debug, "debug"),
    (LogLevel::Trace, "trace"),
];

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Error,
            Self::Warn,
            Self::Info,
            Self::Debug,
            Self::Trace,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.name()))
    }
}

impl LogLevel {
    fn name(&self) -> &'static str {
        LEVELS[*self as usize].1
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Verbosity as expected by stderrlog (0 = errors only)
    pub fn verbosity(&self) -> usize {
        (*self as usize).saturating_sub(1)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Initialize logging from command line arguments
pub fn init_log(m: &ArgMatches) -> anyhow::Result<()> {
    let level = m
        .get_one::<LogLevel>("loglevel")
        .copied()
        .expect("Missing default log level"); // Should be enforced by clap

    stderrlog::new()
        .quiet(level.is_none())
        .verbosity(level.verbosity())
        .init()
        .map_err(|e| anyhow!("Could not initialize logging: {}", e))?;
    debug!("Log level set to {}", level);
    Ok(())
}
