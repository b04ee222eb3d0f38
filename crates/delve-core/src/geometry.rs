//! World geometry: locations, boundary boxes, and the coarse cell grid used
//! by the registry's spatial index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Edge length, in blocks, of one spatial cell (a world chunk).
pub const CELL_SIZE: i32 = 16;

/// Widest horizontal span, in blocks, of a box the spatial index accepts.
/// At 4096 blocks a box covers at most 257 x 257 cells.
pub const MAX_BOX_EXTENT: f64 = 4096.0;

/// Name of a world (dimension) hosted by the game runtime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    /// Wraps a world name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the world name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in a specific world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World the point belongs to.
    pub world: WorldId,
    /// East/west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North/south coordinate.
    pub z: f64,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// Returns a copy shifted by the given deltas in the same world.
    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Euclidean distance, or `None` when the points are in different worlds.
    #[must_use]
    pub fn distance(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// True when `other` is in the same world and at most `radius` away.
    #[must_use]
    pub fn within(&self, other: &Location, radius: f64) -> bool {
        self.distance(other).is_some_and(|d| d <= radius)
    }

    /// The cell containing this point.
    #[must_use]
    pub fn cell(&self) -> CellKey {
        CellKey {
            world: self.world.clone(),
            x: cell_coord(self.x),
            z: cell_coord(self.z),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cell_coord(value: f64) -> i32 {
    (value.floor() as i32).div_euclid(CELL_SIZE)
}

/// Coarse grid key used to narrow location lookups: world plus chunk
/// coordinates on the horizontal plane.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// World of the cell.
    pub world: WorldId,
    /// Chunk x.
    pub x: i32,
    /// Chunk z.
    pub z: i32,
}

impl CellKey {
    /// Creates a cell key.
    #[must_use]
    pub fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }
}

/// Axis-aligned bounding box inside one world. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// World the box lives in.
    pub world: WorldId,
    /// Minimum corner `[x, y, z]`.
    pub min: [f64; 3],
    /// Maximum corner `[x, y, z]`.
    pub max: [f64; 3],
}

impl Aabb {
    /// Creates a box from two corners, normalising their order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the corners are in different
    /// worlds or any coordinate is not finite.
    pub fn from_corners(a: &Location, b: &Location) -> Result<Self, DomainError> {
        if a.world != b.world {
            return Err(DomainError::InvalidArgument(format!(
                "box corners span worlds {} and {}",
                a.world, b.world
            )));
        }
        let coords = [a.x, a.y, a.z, b.x, b.y, b.z];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(DomainError::InvalidArgument(
                "box corners must be finite".to_owned(),
            ));
        }
        Ok(Self {
            world: a.world.clone(),
            min: [a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)],
            max: [a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)],
        })
    }

    /// A box around `origin`: `half_width` on both horizontal axes, `depth`
    /// below and `height` above.
    #[must_use]
    pub fn around(origin: &Location, half_width: f64, depth: f64, height: f64) -> Self {
        Self {
            world: origin.world.clone(),
            min: [origin.x - half_width, origin.y - depth, origin.z - half_width],
            max: [origin.x + half_width, origin.y + height, origin.z + half_width],
        }
    }

    /// World identity check plus inclusive containment.
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        location.world == self.world
            && (self.min[0]..=self.max[0]).contains(&location.x)
            && (self.min[1]..=self.max[1]).contains(&location.y)
            && (self.min[2]..=self.max[2]).contains(&location.z)
    }

    /// Longest horizontal side of the box.
    #[must_use]
    pub fn horizontal_extent(&self) -> f64 {
        (self.max[0] - self.min[0]).max(self.max[2] - self.min[2])
    }

    /// Checks the box can go into the spatial index.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if a coordinate is not finite
    /// or either horizontal side is longer than [`MAX_BOX_EXTENT`].
    pub fn ensure_indexable(&self) -> Result<(), DomainError> {
        if self.min.iter().chain(&self.max).any(|c| !c.is_finite()) {
            return Err(DomainError::InvalidArgument(
                "boundary coordinates must be finite".to_owned(),
            ));
        }
        let extent = self.horizontal_extent();
        if extent > MAX_BOX_EXTENT {
            return Err(DomainError::InvalidArgument(format!(
                "boundary spans {extent} blocks, more than {MAX_BOX_EXTENT}"
            )));
        }
        Ok(())
    }

    /// Every cell the box intersects, in row-major order.
    #[must_use]
    pub fn cells(&self) -> Vec<CellKey> {
        let (x0, x1) = (cell_coord(self.min[0]), cell_coord(self.max[0]));
        let (z0, z1) = (cell_coord(self.min[2]), cell_coord(self.max[2]));
        let mut cells = Vec::new();
        for x in x0..=x1 {
            for z in z0..=z1 {
                cells.push(CellKey::new(self.world.clone(), x, z));
            }
        }
        cells
    }
}
