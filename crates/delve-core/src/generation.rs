//! Contract for the procedural generation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::geometry::{Aabb, Location};

/// Footprint produced by a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGeometry {
    /// Where entering players are placed.
    pub spawn: Location,
    /// Region the instance occupies.
    pub bounds: Aabb,
}

/// Builds the layout for a template at a target location.
///
/// How the layout is produced (blueprints, noise, hand-authored rooms) is
/// invisible to the registry; it only needs the resulting geometry.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generates an instance of `template_id` anchored at `origin`.
    async fn generate(
        &self,
        template_id: &str,
        origin: &Location,
    ) -> Result<InstanceGeometry, DomainError>;
}

/// Generator that carves a plain box of fixed extent around the origin.
#[derive(Debug, Clone, Copy)]
pub struct BoxLayoutGenerator {
    /// Horizontal half-width of the box.
    pub half_width: f64,
    /// Blocks below the origin.
    pub depth: f64,
    /// Blocks above the origin.
    pub height: f64,
}

#[async_trait]
impl GenerationService for BoxLayoutGenerator {
    async fn generate(
        &self,
        template_id: &str,
        origin: &Location,
    ) -> Result<InstanceGeometry, DomainError> {
        if template_id.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "template id must not be empty".to_owned(),
            ));
        }
        Ok(InstanceGeometry {
            spawn: origin.offset(0.0, 1.0, 0.0),
            bounds: Aabb::around(origin, self.half_width, self.depth, self.height),
        })
    }
}
