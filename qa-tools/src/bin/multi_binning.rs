//! Characterise white and red noise by binning light curves in time.
//!
//! Objects are grouped into nine logarithmic flux bins between 10² and 10⁵.
//! For each group the median fractional RMS is measured at increasing
//! binning factors and fitted with a white plus red noise model. Flux bins
//! are independent jobs spread over a rayon pool unless `--serial` is given.
//!
//! Output is one CSV row per (flux bin, binning factor) with the measured
//! RMS, its error, the pure white-noise expectation and the fitted model.
//!
//! Usage:
//! ```bash
//! multi_binning --frames good_frames.csv --flux corrected.csv -o noise.csv
//! multi_binning --frames frames.csv --flux flux.csv --exposure-column exposure \
//!     --nights 0,2 --serial -o noise.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ndarray::Axis;
use qa_common::nights::{night_ranges, select_nights, NIGHT_SPLIT_GAP_DAYS};
use qa_common::noise::{extract_noise_results, flux_bin_edges, write_noise_results};
use qa_common::photometry::normalise_by_exposure;
use qa_common::{init_logging, QaPool};
use qa_tools::shared_args::{check_single_stdin, CommonArgs, FrameInputArgs, OutputArgs, PoolArgs};
use qa_tools::{read_frames_and_flux, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "multi_binning",
    about = "Fractional RMS against binning factor for nine flux bins",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    pool: PoolArgs,

    #[command(flatten)]
    input: FrameInputArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Frames-table column holding the frame time in days
    #[arg(long, default_value = "mjd")]
    time_column: String,

    /// Divide each frame by this frames-table column before analysis
    #[arg(long)]
    exposure_column: Option<String>,

    /// Only use these nights (0-based, comma separated); nights are split
    /// at gaps longer than half a day
    #[arg(long, value_delimiter = ',')]
    nights: Vec<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let mut config = args.common.load_config()?;
    args.pool.apply(&mut config.pool);
    config.validate()?;

    check_single_stdin(&[&args.input.frames, &args.input.flux]).map_err(anyhow::Error::msg)?;
    let (frames, flux_table) = read_frames_and_flux(&args.input.frames, &args.input.flux)?;
    let time = frames.column(&args.time_column)?;

    let mut flux = match &args.exposure_column {
        Some(column) => normalise_by_exposure(flux_table.flux.view(), frames.column(column)?)?,
        None => flux_table.flux.clone(),
    };
    let mut time = time.to_owned();

    if !args.nights.is_empty() {
        let ranges = night_ranges(time.view(), NIGHT_SPLIT_GAP_DAYS);
        info!("Nights in data: {}", ranges.len());
        let chosen = args
            .nights
            .iter()
            .map(|&n| {
                ranges
                    .get(n)
                    .copied()
                    .with_context(|| format!("night {n} requested, data has {}", ranges.len()))
            })
            .collect::<Result<Vec<_>>>()?;

        let keep = select_nights(time.view(), &chosen);
        let frames_kept: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(j, &k)| k.then_some(j))
            .collect();
        flux = flux.select(Axis(1), &frames_kept);
        time = time.select(Axis(0), &frames_kept);
        info!("Using {} frames from nights {:?}", frames_kept.len(), args.nights);
    }

    let pool = QaPool::from_config(&config.pool)?;
    let results = extract_noise_results(
        flux.view(),
        time.view(),
        &flux_bin_edges(),
        &pool,
        &config.noise,
    )?;
    anyhow::ensure!(!results.is_empty(), "no flux bin holds any usable objects");

    for result in &results {
        info!(
            "Flux {:>8.1} - {:>8.1}: {:>3} objects, white {:.2} mmag, red {:.2} mmag",
            result.min_flux,
            result.max_flux,
            result.n_objects,
            result.white_level,
            result.red_level
        );
    }

    write_output(&args.output.output, |w| write_noise_results(&results, w))
}
