use serde::{Deserialize, Serialize};

use crate::errors::SurfaceError;
use crate::grid::{nearest_tick_index, Grid, ZValue};
use crate::scatter::Axis2;

/// Direction of a cut through the grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutAxis
{
    /// Constant Y, the series runs along X.
    Row,
    /// Constant X, the series runs along Y.
    Column,
}

impl CutAxis
{
    /// Axis the fixed coordinate is taken from.
    pub fn fixed_axis(&self) -> Axis2
    {
        match self
        {
            CutAxis::Row => Axis2::Y,
            CutAxis::Column => Axis2::X,
        }
    }

    /// Axis the series runs along.
    pub fn series_axis(&self) -> Axis2
    {
        match self
        {
            CutAxis::Row => Axis2::X,
            CutAxis::Column => Axis2::Y,
        }
    }
}

///
/// A 1-D profile read from one grid snapshot. Cells are copied as-is,
/// undefined cells stay undefined.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSection
{
    pub axis: CutAxis,
    /// Index into the tick sequence of `axis.fixed_axis()`.
    pub fixed_index: usize,
    /// Tick value at `fixed_index`.
    pub fixed_coordinate: f64,
    pub series: Vec<(f64, ZValue)>,
}

impl CrossSection
{
    pub fn len(&self) -> usize
    {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.series.is_empty()
    }

    pub fn coordinates(&self) -> Vec<f64>
    {
        self.series.iter().map(|(c, _)| *c).collect()
    }

    pub fn values(&self) -> Vec<ZValue>
    {
        self.series.iter().map(|(_, z)| *z).collect()
    }
}

///
/// Cut `grid` along `axis` at the tick nearest to `coordinate` (ties to the
/// lower index).
///
pub fn extract(grid: &Grid, axis: CutAxis, coordinate: f64) -> Result<CrossSection, SurfaceError>
{
    let index = nearest_tick_index(grid.ticks(axis.fixed_axis()), coordinate).ok_or(SurfaceError::OutOfRange)?;
    extract_at_index(grid, axis, index)
}

/// Cut `grid` along `axis` at tick `index` of the fixed axis.
pub fn extract_at_index(grid: &Grid, axis: CutAxis, index: usize) -> Result<CrossSection, SurfaceError>
{
    let fixed_coordinate = *grid.ticks(axis.fixed_axis()).get(index).ok_or(SurfaceError::OutOfRange)?;
    let cells = match axis
    {
        CutAxis::Row => grid.row(index).ok_or(SurfaceError::OutOfRange)?.to_vec(),
        CutAxis::Column => grid.column(index).ok_or(SurfaceError::OutOfRange)?,
    };
    let series = grid.ticks(axis.series_axis()).iter().copied().zip(cells).collect();
    Ok(CrossSection { axis, fixed_index: index, fixed_coordinate, series })
}
