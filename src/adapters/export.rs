use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::InterpolationMethod;
use crate::cross_section::{CrossSection, CutAxis};
use crate::errors::SurfaceError;
use crate::grid::{Grid, ZValue};

/// Characters that cannot appear in exported file names.
const FORBIDDEN_FILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

///
/// A grid laid out as a table: header row of x ticks, one row per y tick
/// with the tick as row label. `None` marks an undefined cell.
///
#[derive(Clone, Debug, PartialEq)]
pub struct GridTable
{
    pub columns: Vec<f64>,
    pub rows: Vec<(f64, Vec<Option<f64>>)>,
}

impl From<&Grid> for GridTable
{
    fn from(grid: &Grid) -> Self {
        let rows = grid.y_ticks().iter().zip(grid.rows())
            .map(|(&y, row)| (y, row.iter().map(ZValue::value).collect()))
            .collect();
        Self { columns: grid.x_ticks().to_vec(), rows }
    }
}

impl TryFrom<GridTable> for Grid
{
    type Error = SurfaceError;

    fn try_from(table: GridTable) -> Result<Self, Self::Error> {
        let (y_ticks, z): (Vec<f64>, Vec<Vec<ZValue>>) = table.rows.into_iter()
            .map(|(y, row)| (y, row.into_iter().map(ZValue::from).collect()))
            .unzip();
        Grid::new(table.columns, y_ticks, z)
    }
}

/// A cross-section as a two column (coordinate, value) table.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesTable
{
    pub coordinate_label: &'static str,
    pub rows: Vec<(f64, Option<f64>)>,
}

impl From<&CrossSection> for SeriesTable
{
    fn from(section: &CrossSection) -> Self {
        let coordinate_label = match section.axis
        {
            CutAxis::Row => "x",
            CutAxis::Column => "y",
        };
        Self { coordinate_label, rows: section.series.iter().map(|(c, z)| (*c, z.value())).collect() }
    }
}

fn format_cell(value: Option<f64>) -> String
{
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_cell(text: &str, row: usize, column: usize) -> Result<Option<f64>, SurfaceError>
{
    let text = text.trim();
    if text.is_empty()
    {
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| SurfaceError::InvalidCell { row, column })
}

/// Write `grid` with x ticks as header and y ticks as row labels.
pub fn write_grid_csv<W: Write>(grid: &Grid, writer: W) -> Result<(), SurfaceError>
{
    let table = GridTable::from(grid);
    let mut writer = csv::Writer::from_writer(writer);
    let header = std::iter::once(String::new()).chain(table.columns.iter().map(|x| x.to_string()));
    writer.write_record(header).map_err(|_| SurfaceError::CsvWriteFailed)?;
    for (y, row) in &table.rows
    {
        let record = std::iter::once(y.to_string()).chain(row.iter().map(|&z| format_cell(z)));
        writer.write_record(record).map_err(|_| SurfaceError::CsvWriteFailed)?;
    }
    writer.flush().map_err(|_| SurfaceError::FileIOError)
}

/// Read a grid written by `write_grid_csv`.
pub fn read_grid_csv<R: Read>(reader: R) -> Result<Grid, SurfaceError>
{
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let header = reader.headers().map_err(|_| SurfaceError::CsvReadFailed)?.clone();
    let columns = header.iter().enumerate().skip(1)
        .map(|(column, text)| parse_cell(text, 0, column)?.ok_or(SurfaceError::InvalidCell { row: 0, column }))
        .collect::<Result<Vec<f64>, _>>()?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate()
    {
        let record = record.map_err(|_| SurfaceError::CsvReadFailed)?;
        // header is line 0
        let row = index + 1;
        let y = parse_cell(record.get(0).unwrap_or_default(), row, 0)?.ok_or(SurfaceError::InvalidCell { row, column: 0 })?;
        let cells = record.iter().enumerate().skip(1)
            .map(|(column, text)| parse_cell(text, row, column))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((y, cells));
    }
    Grid::try_from(GridTable { columns, rows })
}

/// Write only the cell matrix, without tick labels.
pub fn write_raw_grid_csv<W: Write>(grid: &Grid, writer: W) -> Result<(), SurfaceError>
{
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    for row in grid.rows()
    {
        writer.write_record(row.iter().map(|z| format_cell(z.value()))).map_err(|_| SurfaceError::CsvWriteFailed)?;
    }
    writer.flush().map_err(|_| SurfaceError::FileIOError)
}

/// Write a cross-section as `x,value` (row cuts) or `y,value` (column cuts).
pub fn write_cross_section_csv<W: Write>(section: &CrossSection, writer: W) -> Result<(), SurfaceError>
{
    let table = SeriesTable::from(section);
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([table.coordinate_label, "value"]).map_err(|_| SurfaceError::CsvWriteFailed)?;
    for (coordinate, value) in &table.rows
    {
        writer.write_record([coordinate.to_string(), format_cell(*value)]).map_err(|_| SurfaceError::CsvWriteFailed)?;
    }
    writer.flush().map_err(|_| SurfaceError::FileIOError)
}

/// Replace every run of characters that are not allowed in file names with `-`.
pub fn sanitize_file_stem(name: &str) -> String
{
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars()
    {
        if FORBIDDEN_FILE_CHARS.contains(&c)
        {
            if !in_run
            {
                out.push('-');
            }
            in_run = true;
        }
        else
        {
            out.push(c);
            in_run = false;
        }
    }
    out
}

pub fn image_suffix(method: InterpolationMethod) -> String
{
    format!("_image_{method}")
}

pub fn image_coord_suffix(method: InterpolationMethod) -> String
{
    format!("_image_coord_{method}")
}

pub fn cross_section_suffix(section: &CrossSection, method: InterpolationMethod) -> String
{
    let tag = match section.axis
    {
        CutAxis::Row => "hcs",
        CutAxis::Column => "vcs",
    };
    format!("_{tag}_{:.3}_{method}", section.fixed_coordinate)
}

///
/// Writes export files into a root directory as
/// `<timestamp>_<file stem><suffix>.csv`.
///
#[derive(Clone, Debug)]
pub struct Exporter
{
    root_dir: PathBuf,
    file_stem: Option<String>,
}

impl Exporter
{
    /// Create an exporter, creating `root_dir` if it does not exist.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self, SurfaceError>
    {
        let exporter = Self { root_dir: root_dir.as_ref().to_path_buf(), file_stem: None };
        exporter.ensure_root_dir()?;
        Ok(exporter)
    }

    pub fn root_dir(&self) -> &Path
    {
        &self.root_dir
    }

    pub fn file_stem(&self) -> Option<&str>
    {
        self.file_stem.as_deref()
    }

    /// Set the stem of exported names, usually the stem of the loaded data file.
    pub fn set_file_stem(&mut self, name: &str)
    {
        self.file_stem = Some(sanitize_file_stem(name));
    }

    /// Local time formatted as `%y%m%d%H%M%S`.
    pub fn timestamp_now() -> String
    {
        chrono::Local::now().format("%y%m%d%H%M%S").to_string()
    }

    /// Target path for an export, `None` until a file stem is set.
    pub fn export_path(&self, suffix: &str, timestamp: &str) -> Option<PathBuf>
    {
        let stem = self.file_stem.as_ref()?;
        Some(self.root_dir.join(format!("{timestamp}_{stem}{suffix}.csv")))
    }

    fn ensure_root_dir(&self) -> Result<(), SurfaceError>
    {
        if !self.root_dir.exists()
        {
            fs::create_dir_all(&self.root_dir).map_err(|_| SurfaceError::FileIOError)?;
        }
        Ok(())
    }

    fn export_with<F>(&self, suffix: &str, write: F) -> Result<Option<PathBuf>, SurfaceError>
    where F: FnOnce(File) -> Result<(), SurfaceError>
    {
        let Some(path) = self.export_path(suffix, &Self::timestamp_now()) else {
            return Ok(None);
        };
        self.ensure_root_dir()?;
        let file = File::create(&path).map_err(|_| SurfaceError::FileIOError)?;
        write(file)?;
        info!(path = %path.display(), "exported");
        Ok(Some(path))
    }

    /// Export the bare cell matrix. Returns the written path, `None` without a file stem.
    pub fn export_raw_grid(&self, grid: &Grid, method: InterpolationMethod) -> Result<Option<PathBuf>, SurfaceError>
    {
        self.export_with(&image_suffix(method), |file| write_raw_grid_csv(grid, file))
    }

    pub fn export_grid(&self, grid: &Grid, method: InterpolationMethod) -> Result<Option<PathBuf>, SurfaceError>
    {
        self.export_with(&image_coord_suffix(method), |file| write_grid_csv(grid, file))
    }

    pub fn export_cross_section(&self, section: &CrossSection, method: InterpolationMethod) -> Result<Option<PathBuf>, SurfaceError>
    {
        self.export_with(&cross_section_suffix(section, method), |file| write_cross_section_csv(section, file))
    }
}
