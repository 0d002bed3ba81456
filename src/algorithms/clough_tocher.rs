//! Clough-Tocher C1 piecewise cubic interpolation on a triangulation.
//!
//! Each triangle is split at its centroid into three cubic Bezier patches.
//! Vertex gradients are not known for scattered data, so they are estimated
//! first by minimising the curvature of the interpolant along every edge.

use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::errors::SurfaceError;
use crate::grid::ZValue;
use crate::triangulation::Triangulation;

use super::SurfaceEvaluator;

/// Maximum number of Gauss-Seidel sweeps of the gradient estimation.
pub const GRADIENT_MAX_ITERATIONS: usize = 400;
/// Relative change below which the gradient estimation stops.
pub const GRADIENT_TOLERANCE: f64 = 1e-6;

pub struct CloughTocher<'a>
{
    triangulation: &'a Triangulation,
    values: &'a [f64],
    gradients: Vec<[f64; 2]>,
}

impl<'a> CloughTocher<'a>
{
    pub fn new(triangulation: &'a Triangulation, values: &'a [f64], token: &CancellationToken) -> Result<Self, SurfaceError>
    {
        let gradients = estimate_gradients(triangulation, values, token)?;
        Ok(Self { triangulation, values, gradients })
    }

    pub fn gradients(&self) -> &[[f64; 2]]
    {
        &self.gradients
    }

    ///
    /// Direction parameter of the cross-boundary derivative for the edge
    /// opposite local vertex `k` of triangle `t`. Uses the direction towards
    /// the centroid of the neighbouring triangle, which is affine invariant
    /// and shared by both sides of the edge.
    ///
    fn edge_parameter(&self, t: usize, k: usize) -> f64
    {
        let Some(u) = self.triangulation.neighbors()[t][k] else {
            return -0.5;
        };
        let c = self.triangulation.barycentric(t, self.triangulation.centroid(u));
        let (i, j) = ((k + 2) % 3, (k + 1) % 3);
        (2.0 * c[i] + c[j] - 1.0) / (2.0 - 3.0 * c[i] - 3.0 * c[j])
    }

    fn evaluate_in_triangle(&self, t: usize, b: [f64; 3]) -> f64
    {
        let tri = self.triangulation.triangles()[t];
        let [p1, p2, p3] = tri.map(|v| self.triangulation.points()[v]);
        let [f1, f2, f3] = tri.map(|v| self.values[v]);
        let [d1, d2, d3] = tri.map(|v| self.gradients[v]);

        let e12 = [p2[0] - p1[0], p2[1] - p1[1]];
        let e23 = [p3[0] - p2[0], p3[1] - p2[1]];
        let e31 = [p1[0] - p3[0], p1[1] - p3[1]];
        let dot = |g: [f64; 2], e: [f64; 2]| g[0] * e[0] + g[1] * e[1];

        let df12 = dot(d1, e12);
        let df21 = -dot(d2, e12);
        let df23 = dot(d2, e23);
        let df32 = -dot(d3, e23);
        let df31 = dot(d3, e31);
        let df13 = -dot(d1, e31);

        let c3000 = f1;
        let c2100 = (df12 + 3.0 * c3000) / 3.0;
        let c2010 = (df13 + 3.0 * c3000) / 3.0;
        let c0300 = f2;
        let c1200 = (df21 + 3.0 * c0300) / 3.0;
        let c0210 = (df23 + 3.0 * c0300) / 3.0;
        let c0030 = f3;
        let c1020 = (df31 + 3.0 * c0030) / 3.0;
        let c0120 = (df32 + 3.0 * c0030) / 3.0;

        let c2001 = (c2100 + c2010 + c3000) / 3.0;
        let c0201 = (c1200 + c0300 + c0210) / 3.0;
        let c0021 = (c1020 + c0120 + c0030) / 3.0;

        let g = [self.edge_parameter(t, 0), self.edge_parameter(t, 1), self.edge_parameter(t, 2)];

        let c0111 = (g[0] * (-c0300 + 3.0 * c0210 - 3.0 * c0120 + c0030) + (-c0300 + 2.0 * c0210 - c0120 + c0021 + c0201)) / 2.0;
        let c1011 = (g[1] * (-c0030 + 3.0 * c1020 - 3.0 * c2010 + c3000) + (-c0030 + 2.0 * c1020 - c2010 + c2001 + c0021)) / 2.0;
        let c1101 = (g[2] * (-c3000 + 3.0 * c2100 - 3.0 * c1200 + c0300) + (-c3000 + 2.0 * c2100 - c1200 + c2001 + c0201)) / 2.0;

        let c1002 = (c1101 + c1011 + c2001) / 3.0;
        let c0102 = (c1101 + c0111 + c0201) / 3.0;
        let c0012 = (c1011 + c0111 + c0021) / 3.0;
        let c0003 = (c1002 + c0102 + c0012) / 3.0;

        // barycentric coordinates in the sub-triangle: one of b1, b2, b3 is zero
        let min = b[0].min(b[1]).min(b[2]);
        let (b1, b2, b3, b4) = (b[0] - min, b[1] - min, b[2] - min, 3.0 * min);

        b1.powi(3) * c3000 + 3.0 * b1 * b1 * b2 * c2100 + 3.0 * b1 * b1 * b3 * c2010
            + 3.0 * b1 * b1 * b4 * c2001 + 3.0 * b1 * b2 * b2 * c1200
            + 6.0 * b1 * b2 * b4 * c1101 + 3.0 * b1 * b3 * b3 * c1020 + 6.0 * b1 * b3 * b4 * c1011
            + 3.0 * b1 * b4 * b4 * c1002 + b2.powi(3) * c0300 + 3.0 * b2 * b2 * b3 * c0210
            + 3.0 * b2 * b2 * b4 * c0201 + 3.0 * b2 * b3 * b3 * c0120 + 6.0 * b2 * b3 * b4 * c0111
            + 3.0 * b2 * b4 * b4 * c0102 + b3.powi(3) * c0030 + 3.0 * b3 * b3 * b4 * c0021
            + 3.0 * b3 * b4 * b4 * c0012 + b4.powi(3) * c0003
    }
}

impl SurfaceEvaluator for CloughTocher<'_>
{
    fn evaluate(&self, point: [f64; 2]) -> Result<ZValue, SurfaceError> {
        Ok(match self.triangulation.locate(point)
        {
            Some((t, b)) => ZValue::Defined(self.evaluate_in_triangle(t, b)),
            None => ZValue::Undefined,
        })
    }
}

///
/// Estimate vertex gradients by minimising the integrated squared second
/// derivative of the edge-restricted cubic over all edges. Each sweep solves
/// the 2x2 local problem of every vertex with its neighbours held fixed.
///
pub fn estimate_gradients(triangulation: &Triangulation, values: &[f64], token: &CancellationToken) -> Result<Vec<[f64; 2]>, SurfaceError>
{
    let points = triangulation.points();
    let mut y = vec![[0.0; 2]; points.len()];
    for iteration in 0..GRADIENT_MAX_ITERATIONS
    {
        token.checkpoint()?;
        let mut err: f64 = 0.0;
        for v in 0..points.len()
        {
            let neighbours = triangulation.vertex_neighbors(v);
            if neighbours.is_empty()
            {
                continue;
            }
            let mut q = [0.0; 3];
            let mut s = [0.0; 2];
            for &w in neighbours
            {
                let ex = points[w][0] - points[v][0];
                let ey = points[w][1] - points[v][1];
                let l3 = (ex * ex + ey * ey).sqrt().powi(3);
                let df2 = -ex * y[w][0] - ey * y[w][1];
                q[0] += 4.0 * ex * ex / l3;
                q[1] += 4.0 * ex * ey / l3;
                q[2] += 4.0 * ey * ey / l3;
                let rhs = 6.0 * (values[v] - values[w]) - 2.0 * df2;
                s[0] += rhs * ex / l3;
                s[1] += rhs * ey / l3;
            }
            let det = q[0] * q[2] - q[1] * q[1];
            if det.abs() <= f64::EPSILON * (q[0] * q[2]).abs()
            {
                continue;
            }
            let r = [(q[2] * s[0] - q[1] * s[1]) / det, (-q[1] * s[0] + q[0] * s[1]) / det];
            let change = (y[v][0] + r[0]).abs().max((y[v][1] + r[1]).abs());
            y[v] = [-r[0], -r[1]];
            err = err.max(change / r[0].abs().max(r[1].abs()).max(1.0));
        }
        if err < GRADIENT_TOLERANCE
        {
            debug!(iterations = iteration + 1, "gradient estimation converged");
            return Ok(y);
        }
    }
    warn!(iterations = GRADIENT_MAX_ITERATIONS, "gradient estimation did not converge, using last estimate");
    Ok(y)
}
