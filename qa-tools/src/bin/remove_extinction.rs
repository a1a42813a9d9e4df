//! Remove the first-order airmass trend from a flux matrix.
//!
//! Standards are the objects whose median flux lies within
//! `[--flux-min, --flux-max]` (either bound optional). Their median-normalised
//! magnitudes give a bulk light curve that is fitted against the `airmass`
//! column of the frames table; the fitted slope is divided out of every
//! object.
//!
//! Usage:
//! ```bash
//! remove_extinction --frames good_frames.csv --flux good_flux.csv \
//!     --flux-min 1000 --flux-max 20000 -o corrected.csv
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use qa_common::extinction::remove_extinction_with_report;
use qa_common::init_logging;
use qa_common::table::write_flux_matrix;
use qa_tools::shared_args::{check_single_stdin, CommonArgs, FrameInputArgs, OutputArgs};
use qa_tools::{read_frames_and_flux, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "remove_extinction",
    about = "Divide the airmass extinction trend out of a flux matrix",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    input: FrameInputArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Lowest median flux of a standard star
    #[arg(long)]
    flux_min: Option<f64>,

    /// Highest median flux of a standard star
    #[arg(long)]
    flux_max: Option<f64>,

    /// Frames-table column holding the airmass
    #[arg(long, default_value = "airmass")]
    airmass_column: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let mut config = args.common.load_config()?;
    if args.flux_min.is_some() {
        config.extinction.flux_min = args.flux_min;
    }
    if args.flux_max.is_some() {
        config.extinction.flux_max = args.flux_max;
    }
    config.validate()?;

    check_single_stdin(&[&args.input.frames, &args.input.flux]).map_err(anyhow::Error::msg)?;
    let (frames, flux) = read_frames_and_flux(&args.input.frames, &args.input.flux)?;
    let airmass = frames.column(&args.airmass_column)?;

    let (corrected, report) = remove_extinction_with_report(
        flux.flux.view(),
        airmass,
        config.extinction.flux_min,
        config.extinction.flux_max,
    )?;

    if report.degenerate {
        info!("No airmass variation; flux written unchanged");
    } else {
        info!(
            "Extinction {:.4} mag/airmass from {} standards over {} frames",
            report.fit.slope, report.n_standards, report.n_fit_frames
        );
    }

    write_output(&args.output.output, |w| {
        write_flux_matrix(corrected.view(), &flux.frame_labels, w)
    })
}
