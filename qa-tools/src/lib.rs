//! Command-line front ends for the survey QA routines.
//!
//! Every tool reads CSV (per-frame metadata tables, per-object tables and
//! objects × frames flux matrices) and writes CSV, so the tools chain:
//!
//! ```text
//! good_measurements --frames frames.csv --objects objects.csv --flux flux.csv \
//!     --frames-output good_frames.csv -o good_flux.csv
//! remove_extinction --frames good_frames.csv --flux good_flux.csv -o corrected.csv
//! multi_binning --frames good_frames.csv --flux corrected.csv -o noise.csv
//! ```

pub mod shared_args;

use std::io::Write;

use anyhow::{Context, Result};
use ndarray::Array1;
use qa_common::{ColumnTable, FluxTable, SortKey, Target};

/// Load a column table, naming the source in any error.
pub fn read_table(target: &Target, sort_key: &SortKey) -> Result<ColumnTable> {
    let reader = target
        .open_read()
        .with_context(|| format!("opening {target}"))?;
    ColumnTable::from_reader(reader, sort_key).with_context(|| format!("reading table {target}"))
}

/// Load a flux matrix, naming the source in any error.
pub fn read_flux(target: &Target) -> Result<FluxTable> {
    let reader = target
        .open_read()
        .with_context(|| format!("opening {target}"))?;
    FluxTable::from_reader(reader).with_context(|| format!("reading flux matrix {target}"))
}

/// Load the per-frame table and the flux matrix, checking they describe the
/// same frames.
///
/// Frames are kept in file order so columns of the flux matrix stay aligned
/// with table rows.
pub fn read_frames_and_flux(frames: &Target, flux: &Target) -> Result<(ColumnTable, FluxTable)> {
    let table = read_table(frames, &SortKey::None)?;
    let flux_table = read_flux(flux)?;
    anyhow::ensure!(
        table.len() == flux_table.n_frames(),
        "{frames} describes {} frames but {flux} has {} columns",
        table.len(),
        flux_table.n_frames()
    );
    Ok((table, flux_table))
}

/// Frame labels where `mask` is true.
pub fn select_labels(labels: &[String], mask: &Array1<bool>) -> Vec<String> {
    labels
        .iter()
        .zip(mask.iter())
        .filter_map(|(label, &keep)| keep.then(|| label.clone()))
        .collect()
}

/// Write a CSV-producing closure's output to `target`, naming it in errors.
pub fn write_output<F>(target: &Target, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> qa_common::Result<()>,
{
    let mut writer = target
        .open_write()
        .with_context(|| format!("creating {target}"))?;
    write(&mut *writer).with_context(|| format!("writing {target}"))?;
    writer.flush().with_context(|| format!("flushing {target}"))?;
    log::info!("Wrote {target}");
    Ok(())
}
