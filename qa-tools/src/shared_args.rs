use clap::{ArgAction, Args};
use qa_common::config::{PoolConfig, QaConfig};
use qa_common::{LogConfig, Target};
use std::path::PathBuf;

/// Options every QA tool accepts.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// JSON configuration file; fields it omits keep their defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Omit timestamps from log lines
    #[arg(long)]
    pub no_timestamps: bool,
}

impl CommonArgs {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            timestamps: !self.no_timestamps,
            ..LogConfig::from_verbosity(self.verbose)
        }
    }

    pub fn load_config(&self) -> qa_common::Result<QaConfig> {
        QaConfig::load_or_default(self.config.as_deref())
    }
}

/// Worker pool selection for tools that fan work out.
#[derive(Args, Debug, Clone, Default)]
pub struct PoolArgs {
    /// Run every job on the main thread
    #[arg(long)]
    pub serial: bool,

    /// Number of worker threads (default: one per core)
    #[arg(long, conflicts_with = "serial")]
    pub threads: Option<usize>,
}

impl PoolArgs {
    /// Overlay the command-line choice on the configured pool.
    pub fn apply(&self, config: &mut PoolConfig) {
        if self.serial {
            config.serial = true;
        }
        if let Some(n) = self.threads {
            config.serial = false;
            config.threads = Some(n);
        }
    }
}

/// Per-frame metadata table plus the objects × frames flux matrix.
#[derive(Args, Debug, Clone)]
pub struct FrameInputArgs {
    /// Per-frame metadata CSV (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    pub frames: Target,

    /// Flux matrix CSV: header of frame labels, one row per object (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    pub flux: Target,
}

/// Output destination, stdout unless told otherwise.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output CSV (`-` for stdout)
    #[arg(short, long, default_value = "-", value_name = "CSV")]
    pub output: Target,
}

/// At most one input may be read from stdin.
pub fn check_single_stdin(targets: &[&Target]) -> Result<(), String> {
    let n_stdin = targets
        .iter()
        .filter(|t| matches!(t, Target::Stdio))
        .count();
    if n_stdin > 1 {
        return Err(format!("{n_stdin} inputs read from stdin; at most one may be '-'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        input: FrameInputArgs,
        #[command(flatten)]
        output: OutputArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["tool", "--frames", "f.csv", "--flux", "-"]).unwrap();
        assert_eq!(cli.input.frames, Target::Path("f.csv".into()));
        assert_eq!(cli.input.flux, Target::Stdio);
        assert_eq!(cli.output.output, Target::Stdio);
        assert_eq!(cli.common.verbose, 0);
        assert!(cli.common.log_config().timestamps);
    }

    #[test]
    fn test_verbosity_and_pool_override() {
        let cli = TestCli::try_parse_from([
            "tool", "-vv", "--threads", "4", "--frames", "a", "--flux", "b", "-o", "out.csv",
        ])
        .unwrap();
        assert_eq!(cli.common.log_config().level, log::LevelFilter::Trace);

        let mut pool = PoolConfig {
            serial: true,
            threads: None,
        };
        cli.pool.apply(&mut pool);
        assert!(!pool.serial);
        assert_eq!(pool.threads, Some(4));
        assert_eq!(cli.output.output, Target::Path("out.csv".into()));
    }

    #[test]
    fn test_serial_conflicts_with_threads() {
        let result = TestCli::try_parse_from([
            "tool", "--serial", "--threads", "2", "--frames", "a", "--flux", "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_single_stdin() {
        assert!(check_single_stdin(&[&Target::Stdio, &Target::Path("a".into())]).is_ok());
        assert!(check_single_stdin(&[&Target::Stdio, &Target::Stdio]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let common = CommonArgs {
            config: Some("/nonexistent/qa.json".into()),
            ..Default::default()
        };
        assert!(common.load_config().is_err());
        assert_eq!(CommonArgs::default().load_config().unwrap(), QaConfig::default());
    }
}
