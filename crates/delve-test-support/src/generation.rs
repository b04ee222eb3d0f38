//! Test generation services.

use async_trait::async_trait;
use delve_core::error::DomainError;
use delve_core::generation::{GenerationService, InstanceGeometry};
use delve_core::geometry::{Aabb, Location};

/// A generator that returns a cube of the given half-width around the origin,
/// spawning players at the origin itself.
#[derive(Debug, Clone, Copy)]
pub struct FixedGenerator {
    /// Horizontal half-width (also used for depth and height).
    pub half_width: f64,
}

#[async_trait]
impl GenerationService for FixedGenerator {
    async fn generate(
        &self,
        _template_id: &str,
        origin: &Location,
    ) -> Result<InstanceGeometry, DomainError> {
        Ok(InstanceGeometry {
            spawn: origin.clone(),
            bounds: Aabb::around(origin, self.half_width, self.half_width, self.half_width),
        })
    }
}

/// A generator that always fails with an infrastructure error.
#[derive(Debug, Clone, Copy)]
pub struct FailingGenerator;

#[async_trait]
impl GenerationService for FailingGenerator {
    async fn generate(
        &self,
        template_id: &str,
        _origin: &Location,
    ) -> Result<InstanceGeometry, DomainError> {
        Err(DomainError::Infrastructure(format!(
            "no blueprint for {template_id}"
        )))
    }
}
