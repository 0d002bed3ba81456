use serde::{Deserialize, Serialize};

use crate::errors::SurfaceError;

/// Upper bound on the number of samples a `ScatterSet` may hold.
pub const MAX_SCATTER_POINTS: usize = 100;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint
{
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ScatterPoint
{
    pub fn new(x: f64, y: f64, z: f64) -> Self
    {
        Self { x, y, z }
    }

    #[inline]
    pub fn xy(&self) -> [f64; 2]
    {
        [self.x, self.y]
    }

    fn is_finite(&self) -> bool
    {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for ScatterPoint
{
    fn from(value: [f64; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

///
/// Validated, insertion-ordered collection of sample points.
///
/// The insertion index of a point is used as the deterministic tie-breaker
/// everywhere two samples compete for the same grid cell.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterSet
{
    points: Vec<ScatterPoint>,
}

impl ScatterSet
{
    pub fn new(points: Vec<ScatterPoint>) -> Result<Self, SurfaceError>
    {
        if points.is_empty()
        {
            return Err(SurfaceError::EmptyInput);
        }
        if points.len() > MAX_SCATTER_POINTS
        {
            return Err(SurfaceError::TooManyPoints(points.len()));
        }
        if !points.iter().all(ScatterPoint::is_finite)
        {
            return Err(SurfaceError::NonFiniteValue);
        }
        Ok(Self { points })
    }

    pub fn from_triples(triples: &[[f64; 3]]) -> Result<Self, SurfaceError>
    {
        Self::new(triples.iter().copied().map(ScatterPoint::from).collect())
    }

    pub fn points(&self) -> &[ScatterPoint]
    {
        &self.points
    }

    pub fn len(&self) -> usize
    {
        self.points.len()
    }

    /// False for every constructed set.
    pub fn is_empty(&self) -> bool
    {
        self.points.is_empty()
    }

    pub fn xs(&self) -> Vec<f64>
    {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64>
    {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn zs(&self) -> Vec<f64>
    {
        self.points.iter().map(|p| p.z).collect()
    }

    /// Raw (x, y) positions, used for the "show original sample points" overlay.
    pub fn overlay_coordinates(&self) -> Vec<[f64; 2]>
    {
        self.points.iter().map(ScatterPoint::xy).collect()
    }

    /// (min, max) of the samples along `axis`.
    pub fn coord_range(&self, axis: Axis2) -> (f64, f64)
    {
        let values = match axis
        {
            Axis2::X => self.xs(),
            Axis2::Y => self.ys(),
        };
        values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

impl TryFrom<Vec<ScatterPoint>> for ScatterSet
{
    type Error = SurfaceError;

    fn try_from(value: Vec<ScatterPoint>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ScatterSet
{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw
        {
            points: Vec<ScatterPoint>,
        }
        let raw = Raw::deserialize(deserializer)?;
        ScatterSet::new(raw.points).map_err(serde::de::Error::custom)
    }
}

/// Planar coordinate axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis2
{
    X,
    Y,
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn rejects_empty_set()
    {
        assert_eq!(ScatterSet::new(Vec::new()), Err(SurfaceError::EmptyInput));
    }

    #[test]
    fn rejects_more_than_limit()
    {
        let points: Vec<_> = (0..101).map(|i| ScatterPoint::new(i as f64, (i * i) as f64, 0.0)).collect();
        assert_eq!(ScatterSet::new(points), Err(SurfaceError::TooManyPoints(101)));
        let points: Vec<_> = (0..100).map(|i| ScatterPoint::new(i as f64, 0.0, 0.0)).collect();
        assert_eq!(ScatterSet::new(points).unwrap().len(), 100);
    }

    #[test]
    fn rejects_non_finite()
    {
        let r = ScatterSet::from_triples(&[[0.0, 0.0, 1.0], [f64::NAN, 1.0, 2.0]]);
        assert_eq!(r, Err(SurfaceError::NonFiniteValue));
    }

    #[test]
    fn keeps_insertion_order_and_ranges()
    {
        let set = ScatterSet::from_triples(&[[2.0, -1.0, 1.0], [0.0, 3.0, 2.0], [1.0, 0.0, 3.0]]).unwrap();
        assert_eq!(set.xs(), vec![2.0, 0.0, 1.0]);
        assert_eq!(set.zs(), vec![1.0, 2.0, 3.0]);
        assert_eq!(set.coord_range(Axis2::X), (0.0, 2.0));
        assert_eq!(set.coord_range(Axis2::Y), (-1.0, 3.0));
        assert_eq!(set.overlay_coordinates()[1], [0.0, 3.0]);
    }

    #[test]
    fn deserialization_validates()
    {
        let ok: ScatterSet = serde_json::from_str(r#"{"points":[{"x":0.0,"y":0.0,"z":1.0}]}"#).unwrap();
        assert_eq!(ok.len(), 1);
        let empty: Result<ScatterSet, _> = serde_json::from_str(r#"{"points":[]}"#);
        assert!(empty.is_err());
    }
}
