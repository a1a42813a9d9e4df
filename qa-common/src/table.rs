//! Column-addressed numeric tables read from CSV.
//!
//! [`ColumnTable`] holds named `f64` columns of equal length, looked up
//! explicitly by name. Per-frame metadata (`mjd`, `airmass`, `shift`, ...)
//! and per-object metadata (`ccdx`, `ccdy`) arrive in this form.
//!
//! [`FluxTable`] holds an objects × frames flux matrix: one CSV row per
//! object, one column per frame, with a header row of frame labels.

use std::io::{Read, Write};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{QaError, Result};

/// Column the table is sorted on when the caller does not say otherwise.
pub const DEFAULT_SORT_COLUMN: &str = "mjd";

/// Row ordering applied after loading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Sort on [`DEFAULT_SORT_COLUMN`] if the table has it, else keep file order
    #[default]
    Default,
    /// Keep file order
    None,
    /// Sort on the named column, which must exist
    Column(String),
}

/// Ordered set of equal-length named numeric columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    columns: Vec<(String, Array1<f64>)>,
}

fn parse_cell(value: &str, row: usize, column: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| {
        QaError::Parse(format!(
            "row {row}, column '{column}': '{value}' is not a number"
        ))
    })
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a CSV with a header row; every cell must parse as `f64`.
    pub fn from_reader<R: Read>(reader: R, sort_key: &SortKey) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(QaError::Parse(format!("duplicate column '{name}'")));
            }
        }

        let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            for ((cell, name), column) in record.iter().zip(&names).zip(values.iter_mut()) {
                column.push(parse_cell(cell, row, name)?);
            }
        }

        let mut table = ColumnTable {
            columns: names
                .into_iter()
                .zip(values)
                .map(|(name, v)| (name, Array1::from_vec(v)))
                .collect(),
        };

        match sort_key {
            SortKey::None => {}
            SortKey::Default => {
                if table.contains(DEFAULT_SORT_COLUMN) {
                    table.sort_by(DEFAULT_SORT_COLUMN)?;
                }
            }
            SortKey::Column(name) => table.sort_by(name)?,
        }

        log::debug!(
            "Loaded table with {} columns and {} rows",
            table.columns.len(),
            table.len()
        );
        Ok(table)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.view())
            .ok_or_else(|| QaError::KeyNotFound(name.to_string()))
    }

    /// Add or replace a column. Its length must match the existing rows.
    pub fn insert(&mut self, name: &str, values: Array1<f64>) -> Result<()> {
        if !self.columns.is_empty() {
            crate::error::check_len("inserted column", self.len(), values.len())?;
        }
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, column)) => *column = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(())
    }

    /// Reorder every column so `name` is ascending. The sort is stable.
    pub fn sort_by(&mut self, name: &str) -> Result<()> {
        let order = {
            let key = self.column(name)?;
            let mut order: Vec<usize> = (0..key.len()).collect();
            order.sort_by(|&a, &b| key[a].total_cmp(&key[b]));
            order
        };

        for (_, column) in self.columns.iter_mut() {
            let reordered: Array1<f64> = order.iter().map(|&i| column[i]).collect();
            *column = reordered;
        }
        Ok(())
    }

    /// Keep the rows where `mask` is true.
    pub fn select_rows(&self, mask: &Array1<bool>) -> Result<ColumnTable> {
        crate::error::check_len("row mask", self.len(), mask.len())?;
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        Ok(ColumnTable {
            columns: self
                .columns
                .iter()
                .map(|(name, c)| (name.clone(), c.select(Axis(0), &rows)))
                .collect(),
        })
    }

    /// Write the table as CSV with columns in insertion order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.names())?;
        for row in 0..self.len() {
            csv_writer.write_record(self.columns.iter().map(|(_, c)| c[row].to_string()))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Flux matrix with its frame labels.
#[derive(Debug, Clone)]
pub struct FluxTable {
    pub frame_labels: Vec<String>,
    /// Objects × frames
    pub flux: Array2<f64>,
}

impl FluxTable {
    /// Wrap a matrix, labelling frames `f0`, `f1`, ...
    pub fn new(flux: Array2<f64>) -> Self {
        let frame_labels = (0..flux.ncols()).map(|i| format!("f{i}")).collect();
        Self { frame_labels, flux }
    }

    pub fn n_objects(&self) -> usize {
        self.flux.nrows()
    }

    pub fn n_frames(&self) -> usize {
        self.flux.ncols()
    }

    /// Read a flux matrix CSV: header of frame labels, one row per object.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let frame_labels: Vec<String> =
            csv_reader.headers()?.iter().map(str::to_string).collect();
        let n_frames = frame_labels.len();

        let mut data = Vec::new();
        let mut n_objects = 0;
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            for (cell, label) in record.iter().zip(&frame_labels) {
                data.push(parse_cell(cell, row, label)?);
            }
            n_objects += 1;
        }

        let flux = Array2::from_shape_vec((n_objects, n_frames), data)
            .map_err(|e| QaError::Parse(e.to_string()))?;
        log::debug!("Loaded flux matrix of {n_objects} objects x {n_frames} frames");
        Ok(Self { frame_labels, flux })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_flux_matrix(self.flux.view(), &self.frame_labels, writer)
    }
}

/// Write an objects × frames matrix as CSV under the given frame labels.
pub fn write_flux_matrix<W: Write>(
    flux: ArrayView2<'_, f64>,
    frame_labels: &[String],
    writer: W,
) -> Result<()> {
    crate::error::check_len("frame labels", flux.ncols(), frame_labels.len())?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(frame_labels)?;
    for row in flux.rows() {
        csv_writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read a headerless CSV of pixel values, one line per image row.
pub fn read_image<R: Read>(reader: R) -> Result<Array2<f64>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut data = Vec::new();
    let mut n_rows = 0;
    let mut n_cols = 0;
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        n_cols = record.len();
        for (col, cell) in record.iter().enumerate() {
            data.push(parse_cell(cell, row, &col.to_string())?);
        }
        n_rows += 1;
    }

    let image = Array2::from_shape_vec((n_rows, n_cols), data)
        .map_err(|e| QaError::Parse(e.to_string()))?;
    log::debug!("Loaded {n_rows}x{n_cols} image");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sorts_by_mjd_by_default() {
        let csv = "mjd,value\n1,1\n5,2\n2,3\n";
        let table = ColumnTable::from_reader(csv.as_bytes(), &SortKey::Default).unwrap();
        assert_eq!(table.column("mjd").unwrap(), array![1.0, 2.0, 5.0]);
        assert_eq!(table.column("value").unwrap(), array![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_no_mjd_keeps_file_order() {
        let csv = "time,value\n1,1\n5,2\n2,3\n";
        let table = ColumnTable::from_reader(csv.as_bytes(), &SortKey::Default).unwrap();
        assert_eq!(table.column("time").unwrap(), array![1.0, 5.0, 2.0]);
        assert_eq!(table.column("value").unwrap(), array![1.0, 2.0, 3.0]);

        let sorted =
            ColumnTable::from_reader(csv.as_bytes(), &SortKey::Column("time".into())).unwrap();
        assert_eq!(sorted.column("time").unwrap(), array![1.0, 2.0, 5.0]);
        assert_eq!(sorted.column("value").unwrap(), array![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_unknown_column_is_key_not_found() {
        let table = ColumnTable::from_reader("a\n1\n".as_bytes(), &SortKey::None).unwrap();
        match table.column("airmass") {
            Err(QaError::KeyNotFound(name)) => assert_eq!(name, "airmass"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ColumnTable::from_reader("a\n1\n".as_bytes(), &SortKey::Column("b".into())),
            Err(QaError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_bad_cell_is_parse_error() {
        let result = ColumnTable::from_reader("a,b\n1,x\n".as_bytes(), &SortKey::None);
        assert!(matches!(result, Err(QaError::Parse(_))));
    }

    #[test]
    fn test_insert_checks_length() {
        let mut table = ColumnTable::new();
        table.insert("a", array![1.0, 2.0]).unwrap();
        assert!(matches!(
            table.insert("b", array![1.0]),
            Err(QaError::ShapeMismatch { .. })
        ));
        table.insert("a", array![3.0, 4.0]).unwrap();
        assert_eq!(table.column("a").unwrap(), array![3.0, 4.0]);
    }

    #[test]
    fn test_select_rows() {
        let mut table = ColumnTable::new();
        table.insert("a", array![1.0, 2.0, 3.0]).unwrap();
        table.insert("b", array![4.0, 5.0, 6.0]).unwrap();

        let kept = table.select_rows(&array![true, false, true]).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.column("b").unwrap(), array![4.0, 6.0]);
        assert!(table.select_rows(&array![true]).is_err());
    }

    #[test]
    fn test_write_then_read_preserves_columns() {
        let mut table = ColumnTable::new();
        table.insert("airmass", array![1.5, 1.25]).unwrap();
        table.insert("shift", array![0.5, 4.0]).unwrap();

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer.clone()).unwrap(),
            "airmass,shift\n1.5,0.5\n1.25,4\n"
        );

        let reread = ColumnTable::from_reader(buffer.as_slice(), &SortKey::None).unwrap();
        assert_eq!(reread.names().collect::<Vec<_>>(), vec!["airmass", "shift"]);
        assert_eq!(reread.column("shift").unwrap(), array![0.5, 4.0]);
    }

    #[test]
    fn test_flux_table_reads_nan_and_shape() {
        let csv = "a,b,c\n100,200,nan\n-5,10,20\n";
        let table = FluxTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.n_objects(), 2);
        assert_eq!(table.n_frames(), 3);
        assert!(table.flux[[0, 2]].is_nan());
        assert_eq!(table.flux[[1, 0]], -5.0);
        assert_eq!(table.frame_labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_flux_table_ragged_rows_rejected() {
        let csv = "a,b\n1,2\n3\n";
        assert!(matches!(
            FluxTable::from_reader(csv.as_bytes()),
            Err(QaError::Csv(_))
        ));
    }

    #[test]
    fn test_read_image() {
        let image = read_image("1, 2, 3\n4,5,6\n".as_bytes()).unwrap();
        assert_eq!(image, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        assert!(matches!(
            read_image("1,2\n3,x\n".as_bytes()),
            Err(QaError::Parse(_))
        ));
        assert!(matches!(read_image("1,2\n3\n".as_bytes()), Err(QaError::Csv(_))));
    }

    #[test]
    fn test_write_flux_matrix_default_labels() {
        let table = FluxTable::new(array![[1.0, 2.5]]);
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "f0,f1\n1,2.5\n");
    }
}
