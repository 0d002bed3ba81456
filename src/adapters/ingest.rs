use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::errors::SurfaceError;
use crate::scatter::{ScatterPoint, ScatterSet};

///
/// Read a headered CSV document and build a `ScatterSet` from its last three
/// columns, taken as x, y and z. Leading columns (ids, labels) are ignored.
///
/// `InvalidCell` reports the zero-based data row (header excluded) and the
/// zero-based column of the first cell that is not a number.
///
pub fn read_scatter_csv<R: Read>(reader: R) -> Result<ScatterSet, SurfaceError>
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = reader.headers().map_err(|_| SurfaceError::CsvReadFailed)?.len();
    if columns < 3
    {
        return Err(SurfaceError::TooFewColumns);
    }
    let first = columns - 3;

    let mut points = Vec::new();
    for (row, record) in reader.records().enumerate()
    {
        let record = record.map_err(|_| SurfaceError::CsvReadFailed)?;
        let mut xyz = [0.0; 3];
        for (k, value) in xyz.iter_mut().enumerate()
        {
            let column = first + k;
            *value = record.get(column)
                .and_then(|cell| cell.parse::<f64>().ok())
                .ok_or(SurfaceError::InvalidCell { row, column })?;
        }
        points.push(ScatterPoint::from(xyz));
    }
    debug!(points = points.len(), columns, "scatter csv parsed");
    ScatterSet::new(points)
}

/// Load a `.csv` file with `read_scatter_csv`. Other extensions are rejected.
pub fn load_scatter_csv<P: AsRef<Path>>(path: P) -> Result<ScatterSet, SurfaceError>
{
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) != Some("csv")
    {
        return Err(SurfaceError::NotCsv);
    }
    let file = File::open(path).map_err(|_| SurfaceError::FileIOError)?;
    read_scatter_csv(file)
}
