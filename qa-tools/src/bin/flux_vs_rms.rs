//! Per-object fractional RMS against median flux.
//!
//! Writes one row per object with its median flux, fractional RMS in
//! millimagnitudes and the index of the brightness bin it falls in (`-1`
//! outside all bins), and logs the median RMS of each bin. Passing a second
//! flux matrix with `--compare` (e.g. the same field after detrending) adds
//! its RMS as an extra column.
//!
//! Usage:
//! ```bash
//! flux_vs_rms --flux flux.csv --compare corrected.csv -o rms.csv
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray::Array1;
use qa_common::noise::FRMS_MMAG;
use qa_common::photometry::{build_bins, fractional_rms, median_flux};
use qa_common::{init_logging, ColumnTable, Target};
use qa_tools::shared_args::{check_single_stdin, CommonArgs, OutputArgs};
use qa_tools::{read_flux, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "flux_vs_rms",
    about = "Fractional RMS of every object against its median flux",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Flux matrix CSV (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    flux: Target,

    /// Second flux matrix of the same objects to compare against
    #[arg(long, value_name = "CSV")]
    compare: Option<Target>,

    #[command(flatten)]
    output: OutputArgs,
}

fn bin_index(value: f64, left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .position(|(&lo, &hi)| value >= lo && value < hi)
        .map_or(-1.0, |i| i as f64)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let mut inputs = vec![&args.flux];
    inputs.extend(args.compare.as_ref());
    check_single_stdin(&inputs).map_err(anyhow::Error::msg)?;

    let flux = read_flux(&args.flux)?;
    let medians = median_flux(flux.flux.view());
    let frms = fractional_rms(flux.flux.view()).mapv(|v| v * FRMS_MMAG);

    let (left, right) = build_bins();
    let bins: Array1<f64> = medians.mapv(|m| bin_index(m, &left, &right));

    for (k, (lo, hi)) in left.iter().zip(&right).enumerate() {
        let in_bin: Vec<f64> = bins
            .iter()
            .zip(frms.iter())
            .filter(|(&b, r)| b == k as f64 && r.is_finite())
            .map(|(_, &r)| r)
            .collect();
        if let Some(med) = qa_math::stats::median(&in_bin) {
            info!(
                "Flux {lo:>8.1} - {hi:>8.1}: {:>4} objects, median RMS {med:.2} mmag",
                in_bin.len()
            );
        }
    }

    let mut table = ColumnTable::new();
    table.insert("median_flux", medians)?;
    table.insert("frms_mmag", frms)?;
    table.insert("flux_bin", bins)?;

    if let Some(target) = &args.compare {
        let other = read_flux(target)?;
        anyhow::ensure!(
            other.n_objects() == flux.n_objects(),
            "{target} has {} objects, {} has {}",
            other.n_objects(),
            args.flux,
            flux.n_objects()
        );
        let other_frms = fractional_rms(other.flux.view()).mapv(|v| v * FRMS_MMAG);
        table.insert("compare_frms_mmag", other_frms)?;
    }

    write_output(&args.output.output, |w| table.write_csv(w))
}
