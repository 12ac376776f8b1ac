//! Dispatch grid sizing for the screen-image compute pass.
//!
//! The grid is expressed in workgroups, not pixels, and always rounds up so
//! every pixel is covered. Invocations that land outside the image are
//! discarded by the compute program itself.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkgroupError {
    #[error("workgroup dimensions must be greater than zero (got {x}x{y})")]
    Zero { x: u32, y: u32 },
    #[error("invalid workgroup '{0}'; expected XxY, e.g. 8x8")]
    Malformed(String),
}

/// Two-dimensional compute workgroup size; both axes are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    x: u32,
    y: u32,
}

impl WorkgroupSize {
    pub fn new(x: u32, y: u32) -> Result<Self, WorkgroupError> {
        if x == 0 || y == 0 {
            return Err(WorkgroupError::Zero { x, y });
        }
        Ok(Self { x, y })
    }

    pub fn x(self) -> u32 {
        self.x
    }

    pub fn y(self) -> u32 {
        self.y
    }

    /// Matches against a shader-declared `local_size`, which is always 3D.
    pub fn matches_local_size(self, local_size: [u32; 3]) -> bool {
        local_size == [self.x, self.y, 1]
    }
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self { x: 8, y: 8 }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for WorkgroupSize {
    type Err = WorkgroupError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (x, y) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| WorkgroupError::Malformed(trimmed.to_string()))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| WorkgroupError::Malformed(trimmed.to_string()))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| WorkgroupError::Malformed(trimmed.to_string()))?;
        Self::new(x, y)
    }
}

/// Number of workgroups launched on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchGrid {
    /// Computes `(ceil(width / wx), ceil(height / wy), 1)`.
    pub fn for_image(width: u32, height: u32, workgroup: WorkgroupSize) -> Self {
        Self {
            x: width.div_ceil(workgroup.x()),
            y: height.div_ceil(workgroup.y()),
            z: 1,
        }
    }

    /// True when the launched invocations reach every pixel of the image.
    pub fn covers(&self, width: u32, height: u32, workgroup: WorkgroupSize) -> bool {
        u64::from(self.x) * u64::from(workgroup.x()) >= u64::from(width)
            && u64::from(self.y) * u64::from(workgroup.y()) >= u64::from(height)
    }

    pub fn as_tuple(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}
