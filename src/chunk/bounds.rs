//! Planar chunk bounds and nearest-point distance queries.
use bevy::math::Vec2;

/// Axis-aligned square in world XZ space.
///
/// `Vec2::x` is world X and `Vec2::y` is world Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkBounds {
    centre: Vec2,
    half_extent: f32,
}

impl ChunkBounds {
    #[must_use]
    pub fn new(centre: Vec2, size: f32) -> Self {
        Self { centre, half_extent: size * 0.5 }
    }

    #[must_use]
    pub fn centre(&self) -> Vec2 {
        self.centre
    }

    #[must_use]
    pub fn min(&self) -> Vec2 {
        self.centre - Vec2::splat(self.half_extent)
    }

    #[must_use]
    pub fn max(&self) -> Vec2 {
        self.centre + Vec2::splat(self.half_extent)
    }

    /// Squared distance from `point` to the closest point of the square.
    /// Zero when `point` lies inside.
    #[must_use]
    pub fn sqr_distance(&self, point: Vec2) -> f32 {
        let closest = point.clamp(self.min(), self.max());
        point.distance_squared(closest)
    }

    #[must_use]
    pub fn distance(&self, point: Vec2) -> f32 {
        self.sqr_distance(point).sqrt()
    }
}
