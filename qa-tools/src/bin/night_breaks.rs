//! List the observing nights in a frames table.
//!
//! A new night starts wherever consecutive frame times jump by more than
//! `--gap` days. One CSV row is written per night with its first and last
//! frame index, start and end time and frame count.
//!
//! Usage:
//! ```bash
//! night_breaks --frames frames.csv
//! night_breaks --frames frames.csv --time-column tmid --gap 0.5 -o nights.csv
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray::Array1;
use qa_common::nights::{find_night_breaks, PLOT_NIGHT_GAP_DAYS};
use qa_common::{init_logging, ColumnTable, SortKey, Target};
use qa_tools::shared_args::{CommonArgs, OutputArgs};
use qa_tools::{read_table, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "night_breaks",
    about = "Split a frames table into observing nights",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Per-frame metadata CSV (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    frames: Target,

    /// Column holding the frame time in days
    #[arg(long, default_value = "mjd")]
    time_column: String,

    /// Minimum gap in days between nights
    #[arg(long, default_value_t = PLOT_NIGHT_GAP_DAYS)]
    gap: f64,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let frames = read_table(&args.frames, &SortKey::Column(args.time_column.clone()))?;
    let time = frames.column(&args.time_column)?;
    anyhow::ensure!(!time.is_empty(), "{} has no frames", args.frames);

    let breaks = find_night_breaks(time, args.gap);
    info!("Found {} night break(s) over {} frames", breaks.len(), time.len());

    let mut starts = vec![0];
    starts.extend(breaks.iter().map(|&b| b + 1));
    let mut ends = breaks;
    ends.push(time.len() - 1);

    let mut table = ColumnTable::new();
    table.insert("night", Array1::from_iter((0..starts.len()).map(|n| n as f64)))?;
    table.insert("first_frame", starts.iter().map(|&s| s as f64).collect())?;
    table.insert("last_frame", ends.iter().map(|&e| e as f64).collect())?;
    table.insert("start", starts.iter().map(|&s| time[s]).collect())?;
    table.insert("end", ends.iter().map(|&e| time[e]).collect())?;
    table.insert(
        "n_frames",
        starts
            .iter()
            .zip(&ends)
            .map(|(&s, &e)| (e - s + 1) as f64)
            .collect(),
    )?;

    write_output(&args.output.output, |w| table.write_csv(w))
}
