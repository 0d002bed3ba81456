use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceError
{
    /// No sample points were supplied.
    EmptyInput,
    /// More points than `MAX_SCATTER_POINTS` were supplied.
    TooManyPoints(usize),
    /// Linear and cubic interpolation need at least three (distinct) points.
    InsufficientPoints(usize),
    /// All points are collinear, no triangulation exists.
    DegenerateGeometry,
    OutOfRange,
    InvalidResolution,
    /// The requested resolution would need more than `MAX_GRID_CELLS` cells.
    GridTooLarge,
    NonFiniteValue,
    ShapeMismatch,
    TicksNotAscending,
    /// The computation was superseded by a newer request.
    Cancelled,
    /// No grid has been computed yet.
    NoGrid,
    KdTreeError,
    NotCsv,
    TooFewColumns,
    InvalidCell { row: usize, column: usize },
    CsvReadFailed,
    CsvWriteFailed,
    FileIOError,
    ConfigParseFailed,
}
impl std::error::Error for SurfaceError {}

impl Display for SurfaceError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self
        {
            SurfaceError::TooManyPoints(n) => write!(f, "TooManyPoints: {n} points supplied, at most {} allowed", crate::scatter::MAX_SCATTER_POINTS),
            SurfaceError::InsufficientPoints(n) => write!(f, "InsufficientPoints: {n} points supplied, at least 3 required"),
            SurfaceError::InvalidCell { row, column } => write!(f, "InvalidCell: row {row}, column {column} is not a number"),
            other => write!(f, "{:?}", other),
        }
    }
}
