use crate::errors::SurfaceError;
use crate::grid::ZValue;
use crate::triangulation::Triangulation;

use super::SurfaceEvaluator;

/// Piecewise linear surface over a triangulation.
pub struct LinearInterpolation<'a>
{
    triangulation: &'a Triangulation,
    values: &'a [f64],
}

impl<'a> LinearInterpolation<'a>
{
    pub fn new(triangulation: &'a Triangulation, values: &'a [f64]) -> Self
    {
        Self { triangulation, values }
    }
}

impl SurfaceEvaluator for LinearInterpolation<'_>
{
    fn evaluate(&self, point: [f64; 2]) -> Result<ZValue, SurfaceError> {
        let Some((t, b)) = self.triangulation.locate(point) else {
            return Ok(ZValue::Undefined);
        };
        // points accepted just outside an edge get clamped weights, so the
        // result never leaves the range of the three vertex values
        let b = b.map(|l| l.max(0.0));
        let sum: f64 = b.iter().sum();
        let tri = self.triangulation.triangles()[t];
        let z = (0..3).map(|k| b[k] / sum * self.values[tri[k]]).sum();
        Ok(ZValue::Defined(z))
    }
}
