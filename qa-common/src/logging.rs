//! Process-wide logger setup for the QA binaries.
//!
//! Library code only talks to the `log` facade; binaries call
//! [`init_logging`] once at start-up with an explicit [`LogConfig`].

use log::LevelFilter;

/// Logger settings chosen by the binary at start-up.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Prefix each record with a timestamp
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// `Info` by default, `Debug` with one `-v`, `Trace` with two or more.
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        Self {
            level,
            ..Self::default()
        }
    }
}

/// Install an `env_logger` writing to stderr. `RUST_LOG` takes precedence
/// over the configured level. Calling this twice is harmless.
pub fn init_logging(config: &LogConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.level).parse_default_env();
    if !config.timestamps {
        builder.format_timestamp(None);
    }
    let _ = builder.try_init();
}
