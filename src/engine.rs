use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::algorithms::clough_tocher::CloughTocher;
use crate::algorithms::linear::LinearInterpolation;
use crate::algorithms::nearest::NearestNeighbour;
use crate::algorithms::SurfaceEvaluator;
use crate::cancellation::CancellationToken;
use crate::config::{InterpolationConfig, InterpolationMethod};
use crate::errors::SurfaceError;
use crate::grid::{axis_ticks, grid_shape, Grid, ZValue};
use crate::scatter::{ScatterPoint, ScatterSet};
use crate::triangulation::Triangulation;

/// Interpolate `scatter` onto a regular grid.
pub fn interpolate(scatter: &ScatterSet, config: &InterpolationConfig) -> Result<Grid, SurfaceError>
{
    interpolate_with_cancel(scatter, config, &CancellationToken::never())
}

///
/// Validate raw samples into a `ScatterSet` and interpolate them. Point count
/// limits are checked before any other work.
///
pub fn interpolate_points(points: &[ScatterPoint], config: &InterpolationConfig) -> Result<Grid, SurfaceError>
{
    let scatter = ScatterSet::new(points.to_vec())?;
    interpolate(&scatter, config)
}

///
/// Interpolate `scatter` onto a regular grid, polling `token` before the
/// triangulation, before gradient estimation, before cell evaluation and
/// between grid rows. Returns `SurfaceError::Cancelled` once the token trips.
///
pub fn interpolate_with_cancel(scatter: &ScatterSet, config: &InterpolationConfig, token: &CancellationToken) -> Result<Grid, SurfaceError>
{
    config.validate()?;
    if scatter.is_empty()
    {
        return Err(SurfaceError::EmptyInput);
    }
    if config.method.needs_triangulation() && scatter.len() < 3
    {
        return Err(SurfaceError::InsufficientPoints(scatter.len()));
    }
    let (xs, ys) = (scatter.xs(), scatter.ys());
    grid_shape(&xs, &ys, config.resolution)?;
    token.checkpoint()?;

    let x_ticks = axis_ticks(&xs, config.resolution);
    let y_ticks = axis_ticks(&ys, config.resolution);
    debug!(method = %config.method, resolution = config.resolution, columns = x_ticks.len(), rows = y_ticks.len(), "grid axes built");

    let values = scatter.zs();
    let rows = match config.method
    {
        InterpolationMethod::Nearest =>
        {
            let op = NearestNeighbour::new(scatter)?;
            evaluate_rows(&op, &x_ticks, &y_ticks, token)?
        },
        InterpolationMethod::Linear =>
        {
            let triangulation = Triangulation::new(&scatter.overlay_coordinates())?;
            token.checkpoint()?;
            let op = LinearInterpolation::new(&triangulation, &values);
            evaluate_rows(&op, &x_ticks, &y_ticks, token)?
        },
        InterpolationMethod::Cubic =>
        {
            let triangulation = Triangulation::new(&scatter.overlay_coordinates())?;
            token.checkpoint()?;
            let op = CloughTocher::new(&triangulation, &values, token)?;
            evaluate_rows(&op, &x_ticks, &y_ticks, token)?
        },
    };
    Grid::new(x_ticks, y_ticks, rows)
}

fn evaluate_rows<OP: SurfaceEvaluator>(op: &OP, x_ticks: &[f64], y_ticks: &[f64], token: &CancellationToken) -> Result<Vec<Vec<ZValue>>, SurfaceError>
{
    token.checkpoint()?;
    y_ticks.par_iter().map(|&y|
    {
        token.checkpoint()?;
        x_ticks.iter().map(|&x| op.evaluate([x, y])).collect::<Result<Vec<_>, _>>()
    }).collect()
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use super::*;

    fn config(method: InterpolationMethod, resolution: u32) -> InterpolationConfig
    {
        InterpolationConfig::new(method, resolution).unwrap()
    }

    fn values(grid: &Grid) -> Vec<Vec<Option<f64>>>
    {
        grid.rows().iter().map(|r| r.iter().map(ZValue::value).collect()).collect()
    }

    #[test]
    fn nearest_on_a_line()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 4.0], [1.0, 0.0, 5.0], [2.0, 0.0, 7.0]]).unwrap();
        let grid = interpolate(&set, &config(InterpolationMethod::Nearest, 1)).unwrap();
        assert_eq!(grid.x_ticks(), &[0.0, 1.0, 2.0]);
        assert_eq!(grid.y_ticks(), &[0.0]);
        assert_eq!(values(&grid), vec![vec![Some(4.0), Some(5.0), Some(7.0)]]);

        let grid = interpolate(&set, &config(InterpolationMethod::Nearest, 2)).unwrap();
        assert_eq!(grid.x_ticks(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(values(&grid), vec![vec![Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0)]]);
    }

    #[test]
    fn nearest_resolution_one_reproduces_samples()
    {
        let triples = [[0.5, 2.0, 1.5], [3.0, -1.0, 2.5], [1.25, 0.0, -4.0], [3.0, 2.0, 9.0], [0.5, -1.0, 0.0], [2.0, 7.5, 3.0]];
        let set = ScatterSet::from_triples(&triples).unwrap();
        let grid = interpolate(&set, &config(InterpolationMethod::Nearest, 1)).unwrap();
        assert_eq!(grid.x_ticks(), &[0.5, 1.25, 2.0, 3.0]);
        assert_eq!(grid.y_ticks(), &[-1.0, 0.0, 2.0, 7.5]);
        for p in &triples
        {
            let row = grid.nearest_index(crate::scatter::Axis2::Y, p[1]).unwrap();
            let col = grid.nearest_index(crate::scatter::Axis2::X, p[0]).unwrap();
            assert_eq!(grid.y_ticks()[row], p[1]);
            assert_eq!(grid.x_ticks()[col], p[0]);
            assert_eq!(grid.cell(row, col), Some(ZValue::Defined(p[2])));
        }
    }

    #[test]
    fn linear_needs_three_points()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 1.0], [1.0, 1.0, 2.0]]).unwrap();
        assert_eq!(interpolate(&set, &config(InterpolationMethod::Linear, 4)), Err(SurfaceError::InsufficientPoints(2)));
        assert_eq!(interpolate(&set, &config(InterpolationMethod::Cubic, 4)), Err(SurfaceError::InsufficientPoints(2)));
        assert!(interpolate(&set, &config(InterpolationMethod::Nearest, 4)).is_ok());
    }

    #[test]
    fn collinear_points_are_degenerate()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 4.0], [1.0, 0.0, 5.0], [2.0, 0.0, 7.0]]).unwrap();
        assert_eq!(interpolate(&set, &config(InterpolationMethod::Linear, 2)), Err(SurfaceError::DegenerateGeometry));
        assert_eq!(interpolate(&set, &config(InterpolationMethod::Cubic, 2)), Err(SurfaceError::DegenerateGeometry));
    }

    #[test]
    fn too_many_points_fail_before_computation()
    {
        let points: Vec<_> = (0..101).map(|i| ScatterPoint::new(i as f64, (i % 7) as f64, 1.0)).collect();
        assert_eq!(interpolate_points(&points, &config(InterpolationMethod::Cubic, 10)), Err(SurfaceError::TooManyPoints(101)));
        assert_eq!(interpolate_points(&[], &config(InterpolationMethod::Nearest, 10)), Err(SurfaceError::EmptyInput));
    }

    #[test]
    fn linear_fills_hull_and_leaves_outside_undefined()
    {
        // triangle hull: the corner (1, 1) of the bounding box is outside
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]]).unwrap();
        let grid = interpolate(&set, &config(InterpolationMethod::Linear, 2)).unwrap();
        assert_eq!(grid.shape(), (3, 3));
        assert_eq!(grid.cell(2, 2), Some(ZValue::Undefined));
        assert_eq!(grid.cell(1, 2), Some(ZValue::Undefined));
        let mid = grid.cell(1, 1).unwrap().value().unwrap();
        assert!((mid - 1.5).abs() < 1e-12);
        assert_eq!(grid.defined_count(), 6);
    }

    #[test]
    fn linear_stays_within_vertex_range()
    {
        let triples = [[0.0, 0.0, 3.0], [4.0, 0.5, -2.0], [1.0, 3.0, 6.0], [3.5, 3.5, 1.0], [2.0, 1.5, 10.0]];
        let set = ScatterSet::from_triples(&triples).unwrap();
        let grid = interpolate(&set, &config(InterpolationMethod::Linear, 7)).unwrap();
        let tri = Triangulation::new(&set.overlay_coordinates()).unwrap();
        for (r, &y) in grid.y_ticks().iter().enumerate()
        {
            for (c, &x) in grid.x_ticks().iter().enumerate()
            {
                match tri.locate([x, y])
                {
                    Some((t, _)) =>
                    {
                        let zs = tri.triangles()[t].map(|v| triples[v][2]);
                        let z = grid.cell(r, c).unwrap().value().unwrap();
                        assert!(z >= zs.iter().cloned().fold(f64::INFINITY, f64::min) - 1e-12);
                        assert!(z <= zs.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + 1e-12);
                    },
                    None => assert_eq!(grid.cell(r, c), Some(ZValue::Undefined)),
                }
            }
        }
    }

    #[test]
    fn cubic_matches_samples_on_their_ticks()
    {
        let triples = [[0.0, 0.0, 1.0], [2.0, 0.0, 3.0], [2.0, 2.0, -1.0], [0.0, 2.0, 0.5], [1.0, 1.0, 4.0]];
        let set = ScatterSet::from_triples(&triples).unwrap();
        let grid = interpolate(&set, &config(InterpolationMethod::Cubic, 3)).unwrap();
        assert_eq!(grid.shape(), (7, 7));
        for p in &triples
        {
            let row = grid.nearest_index(crate::scatter::Axis2::Y, p[1]).unwrap();
            let col = grid.nearest_index(crate::scatter::Axis2::X, p[0]).unwrap();
            assert!((grid.cell(row, col).unwrap().value().unwrap() - p[2]).abs() < 1e-9);
        }
        assert_eq!(grid.defined_count(), 49);
    }

    #[test]
    fn cancelled_request_returns_cancelled()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 1.0], [2.0, 0.0, 3.0], [1.0, 2.0, 0.0]]).unwrap();
        let token = CancellationToken::for_request(Arc::new(AtomicU64::new(2)), 1);
        assert_eq!(interpolate_with_cancel(&set, &config(InterpolationMethod::Linear, 5), &token), Err(SurfaceError::Cancelled));
    }

    #[test]
    fn oversized_resolution_fails_without_allocating()
    {
        let points: Vec<_> = (0..100).map(|i| ScatterPoint::new(i as f64, (i * 7 % 100) as f64, 1.0)).collect();
        let set = ScatterSet::new(points).unwrap();
        for method in InterpolationMethod::ALL
        {
            assert_eq!(interpolate(&set, &config(method, u32::MAX)), Err(SurfaceError::GridTooLarge));
            assert_eq!(interpolate(&set, &config(method, 1000)), Err(SurfaceError::GridTooLarge));
        }
        assert_eq!(interpolate(&set, &config(InterpolationMethod::Nearest, 10)).unwrap().shape(), (991, 991));
    }

    #[test]
    fn invalid_resolution()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 1.0]]).unwrap();
        let bad = InterpolationConfig { method: InterpolationMethod::Nearest, resolution: 0 };
        assert_eq!(interpolate(&set, &bad), Err(SurfaceError::InvalidResolution));
        let grid = interpolate(&set, &config(InterpolationMethod::Nearest, 10)).unwrap();
        assert_eq!(grid.shape(), (1, 1));
    }
}
