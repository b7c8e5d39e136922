//! Height field synthesis from fractal Perlin noise.
//!
//! Sample positions are expressed in LOD 0 vertex units: the vertex at column
//! `x`, row `y` of a chunk samples `sample_centre + (x - half, y - half)`.
//! Neighbouring chunks therefore share their edge samples exactly.
use bevy::math::Vec2;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;

use super::HeightField;
use crate::error::TerrainError;
use crate::settings::HeightMapSettings;

/// Generate a `width x height` field centred on `sample_centre`.
///
/// Rows are filled in parallel; the result does not depend on scheduling.
///
/// # Errors
/// `HeightFieldSize` when either dimension is zero.
pub fn generate_height_field(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    sample_centre: Vec2,
) -> Result<HeightField, TerrainError> {
    if width == 0 || height == 0 {
        return Err(TerrainError::HeightFieldSize { expected: width * height, actual: 0 });
    }

    let noise_settings = &settings.noise;
    let fbm: Fbm<Perlin> = Fbm::new(noise_settings.seed)
        .set_octaves(noise_settings.octaves.max(1))
        .set_frequency(1.0 / noise_settings.scale.max(1e-4))
        .set_persistence(noise_settings.persistence)
        .set_lacunarity(noise_settings.lacunarity);

    #[allow(clippy::cast_precision_loss)]
    let half_w = (width - 1) as f64 * 0.5;
    #[allow(clippy::cast_precision_loss)]
    let half_h = (height - 1) as f64 * 0.5;
    let origin_x = f64::from(sample_centre.x) + noise_settings.offset[0] - half_w;
    let origin_z = f64::from(sample_centre.y) + noise_settings.offset[1] - half_h;

    let mut values = vec![0.0_f32; width * height];
    values.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        #[allow(clippy::cast_precision_loss)]
        let pz = origin_z + y as f64;
        for (x, out) in row.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let px = origin_x + x as f64;
            // fbm output is roughly [-1, 1]
            let normalized = ((fbm.get([px, pz]) + 1.0) * 0.5).clamp(0.0, 1.0);
            #[allow(clippy::cast_possible_truncation)]
            let shaped = (normalized as f32).powf(settings.height_exponent);
            *out = shaped * settings.height_multiplier;
        }
    });

    HeightField::from_values(width, height, values)
}
