//! Overscan levels and dark current of a single detector frame.
//!
//! The image is a headerless CSV of pixel values in ADU, one line per row.
//! The left and right overscans give a linear bias model that is
//! subtracted from the central columns; the sigma-clipped residual is the
//! dark level, converted to electrons per second with `--gain` and
//! `--exposure`. `--region` additionally reports the clipped level inside a
//! header-style `[x1:x2,y1:y2]` region.
//!
//! Usage:
//! ```bash
//! dark_current --image dark.csv --gain 1.2 --exposure 300
//! dark_current --image dark.csv --gain 1.2 --exposure 300 --region '[2:20,1:2048]' -o dark.csv
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ndarray::Array1;
use qa_common::reduction::{dark_current, overscan_levels, parse_overscan_region, region_level};
use qa_common::table::read_image;
use qa_common::{init_logging, ColumnTable, Target};
use qa_tools::shared_args::{CommonArgs, OutputArgs};
use qa_tools::write_output;

#[derive(Parser, Debug)]
#[command(
    name = "dark_current",
    about = "Measure overscan levels and dark current of a detector frame",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Headerless CSV of pixel values (`-` for stdin)
    #[arg(long, value_name = "CSV")]
    image: Target,

    /// Detector gain in electrons per ADU
    #[arg(long)]
    gain: f64,

    /// Exposure time in seconds
    #[arg(long)]
    exposure: f64,

    /// Extra region to measure, as `[x1:x2,y1:y2]`
    #[arg(long)]
    region: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.common.log_config());

    let reader = args
        .image
        .open_read()
        .with_context(|| format!("opening {}", args.image))?;
    let image = read_image(reader).with_context(|| format!("reading image {}", args.image))?;

    let levels = overscan_levels(image.view())?;
    info!(
        "Overscan levels: left {:.2} ADU, right {:.2} ADU",
        levels.left, levels.right
    );

    let dark = dark_current(image.view(), args.gain, args.exposure)?;
    info!(
        "Dark level {:.3} ADU, {:.4} e-/s",
        dark.dark_adu, dark.electrons_per_second
    );

    let mut table = ColumnTable::new();
    table.insert("overscan_left", Array1::from_elem(1, levels.left))?;
    table.insert("overscan_right", Array1::from_elem(1, levels.right))?;
    table.insert("dark_adu", Array1::from_elem(1, dark.dark_adu))?;
    table.insert("dark_e_per_s", Array1::from_elem(1, dark.electrons_per_second))?;

    if let Some(text) = &args.region {
        let region = parse_overscan_region(text)?;
        let level = region_level(image.view(), &region)?;
        info!("Region {text}: {level:.2} ADU");
        table.insert("region_level", Array1::from_elem(1, level))?;
    }

    write_output(&args.output.output, |w| table.write_csv(w))
}
