use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::errors::SurfaceError;
use crate::scatter::Axis2;

///
/// A single grid cell. Cells outside the convex hull of the samples are
/// `Undefined` for the triangulation based methods.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ZValue
{
    Defined(f64),
    Undefined,
}

impl ZValue
{
    #[inline]
    pub fn value(&self) -> Option<f64>
    {
        match self
        {
            ZValue::Defined(v) => Some(*v),
            ZValue::Undefined => None,
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool
    {
        matches!(self, ZValue::Defined(_))
    }
}

impl From<Option<f64>> for ZValue
{
    fn from(value: Option<f64>) -> Self {
        match value
        {
            Some(v) => ZValue::Defined(v),
            None => ZValue::Undefined,
        }
    }
}

///
/// Dense rectangular array of cells over ascending X and Y ticks.
/// `z[row][col]` is the cell at `(x_ticks[col], y_ticks[row])`.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridParts")]
pub struct Grid
{
    x_ticks: Vec<f64>,
    y_ticks: Vec<f64>,
    z: Vec<Vec<ZValue>>,
}

#[derive(Deserialize)]
struct GridParts
{
    x_ticks: Vec<f64>,
    y_ticks: Vec<f64>,
    z: Vec<Vec<ZValue>>,
}

impl TryFrom<GridParts> for Grid
{
    type Error = SurfaceError;

    fn try_from(parts: GridParts) -> Result<Self, Self::Error> {
        Grid::new(parts.x_ticks, parts.y_ticks, parts.z)
    }
}

fn strictly_ascending(ticks: &[f64]) -> bool
{
    ticks.iter().all(|t| t.is_finite()) && ticks.windows(2).all(|w| w[0] < w[1])
}

impl Grid
{
    pub fn new(x_ticks: Vec<f64>, y_ticks: Vec<f64>, z: Vec<Vec<ZValue>>) -> Result<Self, SurfaceError>
    {
        if !strictly_ascending(&x_ticks) || !strictly_ascending(&y_ticks)
        {
            return Err(SurfaceError::TicksNotAscending);
        }
        if z.len() != y_ticks.len() || z.iter().any(|row| row.len() != x_ticks.len())
        {
            return Err(SurfaceError::ShapeMismatch);
        }
        Ok(Self { x_ticks, y_ticks, z })
    }

    pub fn x_ticks(&self) -> &[f64]
    {
        &self.x_ticks
    }

    pub fn y_ticks(&self) -> &[f64]
    {
        &self.y_ticks
    }

    pub fn ticks(&self, axis: Axis2) -> &[f64]
    {
        match axis
        {
            Axis2::X => &self.x_ticks,
            Axis2::Y => &self.y_ticks,
        }
    }

    pub fn rows(&self) -> &[Vec<ZValue>]
    {
        &self.z
    }

    /// (number of rows, number of columns)
    pub fn shape(&self) -> (usize, usize)
    {
        (self.y_ticks.len(), self.x_ticks.len())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<ZValue>
    {
        self.z.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[ZValue]>
    {
        self.z.get(row).map(|r| r.as_slice())
    }

    pub fn column(&self, col: usize) -> Option<Vec<ZValue>>
    {
        if col >= self.x_ticks.len()
        {
            return None;
        }
        Some(self.z.iter().map(|row| row[col]).collect())
    }

    pub fn defined_count(&self) -> usize
    {
        self.z.iter().flatten().filter(|c| c.is_defined()).count()
    }

    /// (min, max) over the defined cells. Used to auto scale a colour bar.
    pub fn z_range(&self) -> Option<(f64, f64)>
    {
        self.z.iter().flatten().filter_map(ZValue::value).fold(None, |acc, v| match acc
        {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// (first, last) tick along `axis`.
    pub fn coord_range(&self, axis: Axis2) -> Option<(f64, f64)>
    {
        let ticks = self.ticks(axis);
        Some((*ticks.first()?, *ticks.last()?))
    }

    /// Index of the tick nearest to `coordinate`, ties going to the lower index.
    pub fn nearest_index(&self, axis: Axis2, coordinate: f64) -> Option<usize>
    {
        nearest_tick_index(self.ticks(axis), coordinate)
    }
}

///
/// Nearest tick to `value` in an ascending sequence. When `value` is exactly
/// half way between two ticks the lower index wins.
///
pub fn nearest_tick_index(ticks: &[f64], value: f64) -> Option<usize>
{
    if ticks.is_empty()
    {
        return None;
    }
    let upper = ticks.partition_point(|&t| t < value);
    if upper == 0
    {
        return Some(0);
    }
    if upper == ticks.len()
    {
        return Some(ticks.len() - 1);
    }
    let lower = upper - 1;
    if value - ticks[lower] <= ticks[upper] - value
    {
        Some(lower)
    }
    else
    {
        Some(upper)
    }
}

/// Upper bound on the number of cells of one interpolated grid.
pub const MAX_GRID_CELLS: usize = 4_000_000;

fn distinct_sorted(values: &[f64]) -> Vec<f64>
{
    let mut seen = FxHashSet::default();
    let mut distinct: Vec<f64> = Vec::with_capacity(values.len());
    for &v in values
    {
        // normalises -0.0 so it is not distinct from 0.0
        let v = v + 0.0;
        if seen.insert(v.to_bits())
        {
            distinct.push(v);
        }
    }
    distinct.sort_by(f64::total_cmp);
    distinct
}

/// Number of ticks `axis_ticks` can produce for `distinct` source values, `None` on overflow.
pub fn tick_count(distinct: usize, resolution: u32) -> Option<usize>
{
    if distinct == 0
    {
        return Some(0);
    }
    (distinct - 1).checked_mul(resolution.max(1) as usize)?.checked_add(1)
}

///
/// (rows, columns) of the grid spanned by `x_values` and `y_values` at
/// `resolution`. Fails with `GridTooLarge` above `MAX_GRID_CELLS`, before
/// anything is allocated for the cells.
///
pub fn grid_shape(x_values: &[f64], y_values: &[f64], resolution: u32) -> Result<(usize, usize), SurfaceError>
{
    let columns = tick_count(distinct_sorted(x_values).len(), resolution).ok_or(SurfaceError::GridTooLarge)?;
    let rows = tick_count(distinct_sorted(y_values).len(), resolution).ok_or(SurfaceError::GridTooLarge)?;
    match rows.checked_mul(columns)
    {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok((rows, columns)),
        _ => Err(SurfaceError::GridTooLarge),
    }
}

///
/// Build the tick sequence of one axis: distinct source values in ascending
/// order, with every gap between neighbours split into `resolution` equal
/// segments. Source values are kept exactly. Callers bound the size with
/// `grid_shape` first.
///
pub fn axis_ticks(values: &[f64], resolution: u32) -> Vec<f64>
{
    let distinct = distinct_sorted(values);
    let resolution = resolution.max(1) as usize;
    let mut ticks = Vec::with_capacity(tick_count(distinct.len(), resolution as u32).unwrap_or(distinct.len()));
    for pair in distinct.windows(2)
    {
        let (a, b) = (pair[0], pair[1]);
        ticks.push(a);
        for j in 1..resolution
        {
            let t = a + (b - a) * j as f64 / resolution as f64;
            // rounding can collapse a subdivision onto its neighbour for tiny gaps
            if t > *ticks.last().unwrap_or(&f64::NEG_INFINITY) && t < b
            {
                ticks.push(t);
            }
        }
    }
    if let Some(&last) = distinct.last()
    {
        ticks.push(last);
    }
    ticks
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn ticks_resolution_one_are_distinct_sorted_values()
    {
        assert_eq!(axis_ticks(&[2.0, 0.0, 1.0, 2.0, 0.0], 1), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn ticks_subdivide_each_gap()
    {
        assert_eq!(axis_ticks(&[0.0, 1.0, 2.0], 2), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        let ticks = axis_ticks(&[0.0, 1.0, 3.0], 4);
        assert_eq!(ticks.len(), 9);
        assert_eq!(ticks[4], 1.0);
        assert!((ticks[5] - 1.5).abs() < 1e-12);
        assert_eq!(*ticks.last().unwrap(), 3.0);
    }

    #[test]
    fn ticks_single_value_and_signed_zero()
    {
        assert_eq!(axis_ticks(&[5.0, 5.0], 10), vec![5.0]);
        assert_eq!(axis_ticks(&[-0.0, 0.0, 1.0], 1).len(), 2);
    }

    #[test]
    fn grid_size_is_bounded()
    {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let ys: Vec<f64> = (0..100).map(|i| (i * 3) as f64).collect();
        assert_eq!(grid_shape(&xs, &ys, 10), Ok((991, 991)));
        assert_eq!(grid_shape(&xs, &ys, 1000), Err(SurfaceError::GridTooLarge));
        assert_eq!(grid_shape(&xs, &ys, u32::MAX), Err(SurfaceError::GridTooLarge));
        // a single distinct value never grows with the resolution
        assert_eq!(grid_shape(&[1.0, 1.0], &[2.0], u32::MAX), Ok((1, 1)));
        assert_eq!(tick_count(3, 2), Some(5));
        assert_eq!(tick_count(usize::MAX, 2), None);
    }

    #[test]
    fn nearest_tick_ties_go_low()
    {
        let ticks = [0.0, 1.0, 2.0];
        assert_eq!(nearest_tick_index(&ticks, 0.5), Some(0));
        assert_eq!(nearest_tick_index(&ticks, 0.51), Some(1));
        assert_eq!(nearest_tick_index(&ticks, -3.0), Some(0));
        assert_eq!(nearest_tick_index(&ticks, 9.0), Some(2));
        assert_eq!(nearest_tick_index(&ticks, 1.0), Some(1));
        assert_eq!(nearest_tick_index(&[], 1.0), None);
    }

    #[test]
    fn grid_shape_is_validated()
    {
        let z = vec![vec![ZValue::Defined(1.0), ZValue::Undefined]];
        assert!(Grid::new(vec![0.0, 1.0], vec![0.0], z.clone()).is_ok());
        assert_eq!(Grid::new(vec![0.0], vec![0.0], z.clone()), Err(SurfaceError::ShapeMismatch));
        assert_eq!(Grid::new(vec![1.0, 0.0], vec![0.0], z), Err(SurfaceError::TicksNotAscending));
    }

    #[test]
    fn accessors()
    {
        let z = vec![
            vec![ZValue::Defined(1.0), ZValue::Undefined, ZValue::Defined(3.0)],
            vec![ZValue::Defined(-2.0), ZValue::Defined(5.0), ZValue::Undefined],
        ];
        let grid = Grid::new(vec![0.0, 1.0, 2.0], vec![10.0, 20.0], z).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.cell(1, 1), Some(ZValue::Defined(5.0)));
        assert_eq!(grid.cell(2, 0), None);
        assert_eq!(grid.column(2).unwrap(), vec![ZValue::Defined(3.0), ZValue::Undefined]);
        assert_eq!(grid.defined_count(), 4);
        assert_eq!(grid.z_range(), Some((-2.0, 5.0)));
        assert_eq!(grid.coord_range(Axis2::Y), Some((10.0, 20.0)));
        assert_eq!(grid.nearest_index(Axis2::Y, 15.0), Some(0));
    }

    #[test]
    fn deserialization_validates_shape()
    {
        let bad = r#"{"x_ticks":[0.0,1.0],"y_ticks":[0.0],"z":[[{"Defined":1.0}]]}"#;
        assert!(serde_json::from_str::<Grid>(bad).is_err());
        let good = r#"{"x_ticks":[0.0],"y_ticks":[0.0],"z":[["Undefined"]]}"#;
        assert_eq!(serde_json::from_str::<Grid>(good).unwrap().cell(0, 0), Some(ZValue::Undefined));
    }
}
