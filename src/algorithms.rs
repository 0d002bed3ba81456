pub mod clough_tocher;
pub mod linear;
pub mod nearest;

use crate::errors::SurfaceError;
use crate::grid::ZValue;

///
/// Evaluates an interpolated surface at a planar point. Implementations are
/// shared between rayon workers, so they must be `Sync`.
///
pub trait SurfaceEvaluator: Sync
{
    fn evaluate(&self, point: [f64; 2]) -> Result<ZValue, SurfaceError>;
}
