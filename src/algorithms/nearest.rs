use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use rustc_hash::FxHashSet;

use crate::errors::SurfaceError;
use crate::grid::ZValue;
use crate::scatter::ScatterSet;

use super::SurfaceEvaluator;

/// Distances closer than this are considered equal when breaking ties.
pub const DISTANCE_EPSILON: f64 = 1e-9;

#[inline]
fn quantize(distance: f64) -> f64
{
    (distance / DISTANCE_EPSILON).round()
}

///
/// Nearest sample lookup. Ties go to the sample with the smallest insertion
/// index in the `ScatterSet`.
///
pub struct NearestNeighbour
{
    tree: KdTree<f64, usize, [f64; 2]>,
    values: Vec<f64>,
}

impl NearestNeighbour
{
    pub fn new(scatter: &ScatterSet) -> Result<Self, SurfaceError>
    {
        let mut tree = KdTree::new(2);
        let mut seen = FxHashSet::default();
        for (i, point) in scatter.points().iter().enumerate()
        {
            // repeated positions always tie, and the first one wins anyway
            if seen.insert([(point.x + 0.0).to_bits(), (point.y + 0.0).to_bits()])
            {
                tree.add(point.xy(), i).map_err(|_| SurfaceError::KdTreeError)?;
            }
        }
        Ok(Self { tree, values: scatter.zs() })
    }

    /// Insertion index of the sample nearest to `point`.
    pub fn nearest_index(&self, point: [f64; 2]) -> Result<usize, SurfaceError>
    {
        let closest = self.tree.nearest(&point, 1, &squared_euclidean).map_err(|_| SurfaceError::KdTreeError)?;
        let Some(&(d2, &first)) = closest.first() else {
            return Err(SurfaceError::EmptyInput);
        };
        let min_distance = d2.sqrt();
        let radius = (min_distance + 2.0 * DISTANCE_EPSILON).powi(2);
        let candidates = self.tree.within(&point, radius, &squared_euclidean).map_err(|_| SurfaceError::KdTreeError)?;
        let key = quantize(min_distance);
        Ok(candidates.iter()
            .filter(|&&(d2, _)| quantize(d2.sqrt()) <= key)
            .map(|&(_, &i)| i)
            .min()
            .unwrap_or(first))
    }
}

impl SurfaceEvaluator for NearestNeighbour
{
    fn evaluate(&self, point: [f64; 2]) -> Result<ZValue, SurfaceError> {
        let index = self.nearest_index(point)?;
        Ok(ZValue::Defined(self.values[index]))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn picks_closest_sample()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 1.0], [10.0, 0.0, 2.0], [0.0, 10.0, 3.0]]).unwrap();
        let nn = NearestNeighbour::new(&set).unwrap();
        assert_eq!(nn.evaluate([1.0, 1.0]).unwrap(), ZValue::Defined(1.0));
        assert_eq!(nn.evaluate([9.0, 2.0]).unwrap(), ZValue::Defined(2.0));
        assert_eq!(nn.evaluate([-5.0, 30.0]).unwrap(), ZValue::Defined(3.0));
    }

    #[test]
    fn ties_go_to_lowest_insertion_index()
    {
        // inserted in reverse spatial order so the tree order differs from insertion order
        let set = ScatterSet::from_triples(&[[2.0, 0.0, 7.0], [0.0, 0.0, 4.0], [1.0, 1.0, 9.0]]).unwrap();
        let nn = NearestNeighbour::new(&set).unwrap();
        // equidistant from all three
        assert_eq!(nn.nearest_index([1.0, 0.0]).unwrap(), 0);
        assert_eq!(nn.nearest_index([1.0, 0.5]).unwrap(), 2);
        // within floating noise of a tie
        assert_eq!(nn.nearest_index([1.0 + 1e-12, 0.0]).unwrap(), 0);
        assert_eq!(nn.nearest_index([1.0 - 1e-12, 0.0]).unwrap(), 0);
    }

    #[test]
    fn repeated_positions_use_first_sample()
    {
        let set = ScatterSet::from_triples(&[[0.0, 0.0, 1.0], [0.0, 0.0, 5.0], [3.0, 0.0, 2.0]]).unwrap();
        let nn = NearestNeighbour::new(&set).unwrap();
        assert_eq!(nn.evaluate([0.5, 0.0]).unwrap(), ZValue::Defined(1.0));
    }
}
