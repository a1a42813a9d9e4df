//! Reject frames with large registration shifts or high airmass, and objects
//! near the detector edge.
//!
//! The frames table needs `shift`, `clouds` and `airmass` columns and the
//! objects table `ccdx` and `ccdy`. The filtered flux matrix goes to
//! `--output`; the surviving rows of the metadata tables can be written
//! alongside so later tools see the same frames.
//!
//! Usage:
//! ```bash
//! good_measurements --frames frames.csv --objects objects.csv --flux flux.csv \
//!     --frames-output good_frames.csv --objects-output good_objects.csv -o good_flux.csv
//! ```

use anyhow::Result;
use clap::Parser;
use qa_common::filter::good_measurement_indices;
use qa_common::table::write_flux_matrix;
use qa_common::{init_logging, SortKey, Target};
use qa_tools::shared_args::{check_single_stdin, CommonArgs, FrameInputArgs, OutputArgs};
use qa_tools::{read_frames_and_flux, read_table, select_labels, write_output};

#[derive(Parser, Debug)]
#[command(
    name = "good_measurements",
    about = "Drop bad frames and off-chip objects from a flux matrix",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    input: FrameInputArgs,

    /// Per-object metadata CSV with `ccdx` and `ccdy` (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    objects: Target,

    #[command(flatten)]
    output: OutputArgs,

    /// Write the kept rows of the frames table here
    #[arg(long, value_name = "CSV")]
    frames_output: Option<Target>,

    /// Write the kept rows of the objects table here
    #[arg(long, value_name = "CSV")]
    objects_output: Option<Target>,

    /// Override the maximum airmass from the configuration
    #[arg(long)]
    max_airmass: Option<f64>,

    /// Override the edge margin in pixels from the configuration
    #[arg(long)]
    ccd_margin: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let mut config = args.common.load_config()?;
    if let Some(max_airmass) = args.max_airmass {
        config.filter.max_airmass = max_airmass;
    }
    if let Some(margin) = args.ccd_margin {
        config.filter.ccd_margin = margin;
    }
    config.validate()?;

    check_single_stdin(&[&args.input.frames, &args.input.flux, &args.objects])
        .map_err(anyhow::Error::msg)?;

    let (frames, flux) = read_frames_and_flux(&args.input.frames, &args.input.flux)?;
    let objects = read_table(&args.objects, &SortKey::None)?;
    anyhow::ensure!(
        objects.len() == flux.n_objects(),
        "{} describes {} objects but {} has {} rows",
        args.objects,
        objects.len(),
        args.input.flux,
        flux.n_objects()
    );

    let masks = good_measurement_indices(
        frames.column("shift")?,
        frames.column("clouds")?,
        frames.column("airmass")?,
        objects.column("ccdx")?,
        objects.column("ccdy")?,
        &config.filter,
    )?;

    let kept = masks.apply(flux.flux.view())?;
    let labels = select_labels(&flux.frame_labels, &masks.per_image);
    write_output(&args.output.output, |w| {
        write_flux_matrix(kept.view(), &labels, w)
    })?;

    if let Some(target) = &args.frames_output {
        let kept_frames = frames.select_rows(&masks.per_image)?;
        write_output(target, |w| kept_frames.write_csv(w))?;
    }
    if let Some(target) = &args.objects_output {
        let kept_objects = objects.select_rows(&masks.per_object)?;
        write_output(target, |w| kept_objects.write_csv(w))?;
    }

    Ok(())
}
