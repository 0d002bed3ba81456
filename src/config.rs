use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SurfaceError;

/// Default number of subdivisions between adjacent source coordinates.
pub const DEFAULT_RESOLUTION: u32 = 10;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod
{
    /// Piecewise linear on a Delaunay triangulation.
    #[default]
    Linear,
    /// C1 piecewise cubic (Clough-Tocher) on a Delaunay triangulation.
    Cubic,
    /// Value of the closest sample.
    Nearest,
}

impl InterpolationMethod
{
    pub const ALL: [InterpolationMethod; 3] = [InterpolationMethod::Linear, InterpolationMethod::Cubic, InterpolationMethod::Nearest];

    pub fn as_str(&self) -> &'static str
    {
        match self
        {
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::Cubic => "cubic",
            InterpolationMethod::Nearest => "nearest",
        }
    }

    /// Linear and cubic need a triangulation of the samples.
    pub fn needs_triangulation(&self) -> bool
    {
        !matches!(self, InterpolationMethod::Nearest)
    }
}

impl Display for InterpolationMethod
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMethod
{
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str()
        {
            "linear" => Ok(InterpolationMethod::Linear),
            "cubic" => Ok(InterpolationMethod::Cubic),
            "nearest" => Ok(InterpolationMethod::Nearest),
            _ => Err(SurfaceError::ConfigParseFailed),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig
{
    pub method: InterpolationMethod,
    /// Number of equal segments each gap between adjacent distinct source
    /// coordinates is split into. Must be positive.
    pub resolution: u32,
}

impl Default for InterpolationConfig
{
    fn default() -> Self {
        Self { method: InterpolationMethod::default(), resolution: DEFAULT_RESOLUTION }
    }
}

impl InterpolationConfig
{
    pub fn new(method: InterpolationMethod, resolution: u32) -> Result<Self, SurfaceError>
    {
        let config = Self { method, resolution };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SurfaceError>
    {
        if self.resolution == 0
        {
            return Err(SurfaceError::InvalidResolution);
        }
        Ok(())
    }

    pub fn with_method(self, method: InterpolationMethod) -> Self
    {
        Self { method, ..self }
    }

    pub fn with_resolution(self, resolution: u32) -> Self
    {
        Self { resolution, ..self }
    }

    /// Read a configuration from a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, SurfaceError>
    {
        let config: Self = serde_json::from_str(text).map_err(|_| SurfaceError::ConfigParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SurfaceError>
    {
        serde_json::to_string(self).map_err(|_| SurfaceError::ConfigParseFailed)
    }
}
