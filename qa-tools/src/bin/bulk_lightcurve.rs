//! Combine a set of comparison stars into one weighted light curve.
//!
//! Objects whose inverse-variance weighted mean flux lies within
//! `[--flux-min, --flux-max]` (either bound optional) are combined frame by
//! frame into a weighted mean flux and its error. The output has one row
//! per frame of the flux matrix.
//!
//! Usage:
//! ```bash
//! bulk_lightcurve --flux flux.csv --fluxerr fluxerr.csv --flux-min 1000 -o bulk.csv
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray::Array1;
use qa_common::photometry::{binned_lightcurve, weighted_mean_flux};
use qa_common::{init_logging, ColumnTable, Target};
use qa_tools::shared_args::{check_single_stdin, CommonArgs, OutputArgs};
use qa_tools::{read_flux, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "bulk_lightcurve",
    about = "Weighted mean light curve of the stars in a flux range",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Flux matrix CSV (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    flux: Target,

    /// Flux error matrix CSV with the same shape as `--flux`
    #[arg(long, value_name = "CSV")]
    fluxerr: Target,

    /// Lowest weighted mean flux of a selected star
    #[arg(long)]
    flux_min: Option<f64>,

    /// Highest weighted mean flux of a selected star
    #[arg(long)]
    flux_max: Option<f64>,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    check_single_stdin(&[&args.flux, &args.fluxerr]).map_err(anyhow::Error::msg)?;
    let flux = read_flux(&args.flux)?;
    let fluxerr = read_flux(&args.fluxerr)?;

    let mean = weighted_mean_flux(flux.flux.view(), fluxerr.flux.view())?;
    let selection: Array1<bool> = mean.mapv(|m| {
        m.is_finite()
            && args.flux_min.map_or(true, |lo| m >= lo)
            && args.flux_max.map_or(true, |hi| m <= hi)
    });
    let n_selected = selection.iter().filter(|&&s| s).count();
    anyhow::ensure!(n_selected > 0, "no objects inside the requested flux range");
    info!("Combining {n_selected} of {} objects", flux.n_objects());

    let lc = binned_lightcurve(flux.flux.view(), fluxerr.flux.view(), &selection)?;

    let mut table = ColumnTable::new();
    table.insert(
        "frame",
        Array1::from_iter((0..flux.n_frames()).map(|j| j as f64)),
    )?;
    table.insert("flux", lc.flux)?;
    table.insert("error", lc.error)?;

    write_output(&args.output.output, |w| table.write_csv(w))
}
