//! Chunk Level-of-Detail (LOD) configuration and selection.
//!
//! A `DetailLevels` table maps viewer distance to a LOD index. The table is
//! validated once on construction (non-empty, finite non-negative thresholds,
//! sorted ascending, supported LODs) and is then shared read-only by every
//! chunk. The last threshold doubles as the maximum view distance.
use serde::{Deserialize, Serialize};

use crate::error::TerrainError;
use crate::settings::MeshSettings;

/// One `(lod, visible distance)` pair as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    pub lod: u8, // Mesh LOD; 0 is full detail, larger values skip more vertices.
    pub visible_dst_threshold: f32, // Up to this distance (world units) this LOD is preferred.
}

/// Validated detail level with its squared threshold cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailLevel {
    pub lod: u8,
    pub visible_dst_threshold: f32,
    pub sqr_visible_dst_threshold: f32,
}

impl From<LodInfo> for DetailLevel {
    fn from(info: LodInfo) -> Self {
        Self {
            lod: info.lod,
            visible_dst_threshold: info.visible_dst_threshold,
            sqr_visible_dst_threshold: info.visible_dst_threshold * info.visible_dst_threshold,
        }
    }
}

/// Ordered detail level table, sorted by increasing threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailLevels {
    levels: Vec<DetailLevel>,
}

impl DetailLevels {
    /// Validate and build a table from the settings representation.
    ///
    /// # Errors
    /// - `EmptyDetailLevels` when `infos` is empty.
    /// - `InvalidThreshold` for negative, NaN or infinite thresholds.
    /// - `UnsortedDetailLevels` when a threshold is below its predecessor.
    /// - `UnsupportedLod` when a LOD is not below `MeshSettings::NUM_SUPPORTED_LODS`.
    pub fn new(infos: &[LodInfo]) -> Result<Self, TerrainError> {
        if infos.is_empty() {
            return Err(TerrainError::EmptyDetailLevels);
        }

        let mut previous = 0.0_f32;
        for (index, info) in infos.iter().enumerate() {
            let threshold = info.visible_dst_threshold;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(TerrainError::InvalidThreshold { index, threshold });
            }
            if threshold < previous {
                return Err(TerrainError::UnsortedDetailLevels { index, threshold, previous });
            }
            if info.lod >= MeshSettings::NUM_SUPPORTED_LODS {
                return Err(TerrainError::UnsupportedLod {
                    lod: info.lod,
                    max: MeshSettings::NUM_SUPPORTED_LODS - 1,
                });
            }
            previous = threshold;
        }

        Ok(Self { levels: infos.iter().copied().map(DetailLevel::from).collect() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always `false`; construction rejects empty tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DetailLevel> {
        self.levels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetailLevel> {
        self.levels.iter()
    }

    /// Largest threshold in the table; chunks farther than this are hidden.
    #[must_use]
    pub fn max_view_distance(&self) -> f32 {
        self.levels.last().map_or(0.0, |l| l.visible_dst_threshold)
    }

    /// Select the table index for a viewer at `distance` from a chunk.
    ///
    /// Returns `None` when the chunk is not visible at that distance.
    /// Otherwise walks the table from the finest level, advancing while
    /// `distance` exceeds the current threshold; the last level is never
    /// tested, so it catches everything up to the view distance.
    ///
    /// # Examples
    /// ```
    /// use terrain_stream::chunk::lod::{DetailLevels, LodInfo};
    /// let table = DetailLevels::new(&[
    ///     LodInfo { lod: 0, visible_dst_threshold: 100.0 },
    ///     LodInfo { lod: 1, visible_dst_threshold: 200.0 },
    ///     LodInfo { lod: 2, visible_dst_threshold: 300.0 },
    /// ]).unwrap();
    /// assert_eq!(table.select_index(50.0), Some(0));
    /// assert_eq!(table.select_index(250.0), Some(2));
    /// assert_eq!(table.select_index(350.0), None);
    /// ```
    #[must_use]
    pub fn select_index(&self, distance: f32) -> Option<usize> {
        if distance > self.max_view_distance() {
            return None;
        }
        let mut index = 0;
        for (i, level) in self.levels.iter().enumerate().take(self.levels.len() - 1) {
            if distance > level.visible_dst_threshold {
                index = i + 1;
            } else {
                break;
            }
        }
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(thresholds: &[f32]) -> DetailLevels {
        let infos: Vec<LodInfo> = thresholds
            .iter()
            .enumerate()
            .map(|(i, &t)| LodInfo { lod: u8::try_from(i).unwrap(), visible_dst_threshold: t })
            .collect();
        DetailLevels::new(&infos).unwrap()
    }

    #[test]
    fn worked_example_selection() {
        let t = table(&[100.0, 200.0, 300.0]);
        assert_eq!(t.select_index(250.0), Some(2));
        assert_eq!(t.select_index(50.0), Some(0));
        assert_eq!(t.select_index(350.0), None);
        assert!((t.max_view_distance() - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let t = table(&[100.0, 200.0, 300.0]);
        assert_eq!(t.select_index(100.0), Some(0));
        assert_eq!(t.select_index(100.5), Some(1));
        assert_eq!(t.select_index(200.0), Some(1));
        assert_eq!(t.select_index(300.0), Some(2));
        assert_eq!(t.select_index(0.0), Some(0));
    }

    #[test]
    fn selection_is_monotonic_in_distance() {
        let t = table(&[10.0, 45.0, 46.0, 120.0, 400.0]);
        let mut last = 0;
        for step in 0..4000 {
            #[allow(clippy::cast_precision_loss)]
            let d = step as f32 * 0.1;
            let idx = t.select_index(d).expect("within view distance");
            assert!(idx >= last, "index dropped from {last} to {idx} at {d}");
            last = idx;
        }
    }

    #[test]
    fn single_level_table_always_selects_it() {
        let t = table(&[80.0]);
        assert_eq!(t.select_index(0.0), Some(0));
        assert_eq!(t.select_index(80.0), Some(0));
        assert_eq!(t.select_index(80.1), None);
    }

    #[test]
    fn squared_threshold_is_cached() {
        let t = table(&[3.0, 12.0]);
        assert!((t.get(0).unwrap().sqr_visible_dst_threshold - 9.0).abs() < f32::EPSILON);
        assert!((t.get(1).unwrap().sqr_visible_dst_threshold - 144.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(matches!(DetailLevels::new(&[]), Err(TerrainError::EmptyDetailLevels)));

        let unsorted = [
            LodInfo { lod: 0, visible_dst_threshold: 200.0 },
            LodInfo { lod: 1, visible_dst_threshold: 100.0 },
        ];
        assert!(matches!(
            DetailLevels::new(&unsorted),
            Err(TerrainError::UnsortedDetailLevels { index: 1, .. })
        ));

        let nan = [LodInfo { lod: 0, visible_dst_threshold: f32::NAN }];
        assert!(matches!(DetailLevels::new(&nan), Err(TerrainError::InvalidThreshold { index: 0, .. })));

        let lod = [LodInfo { lod: MeshSettings::NUM_SUPPORTED_LODS, visible_dst_threshold: 10.0 }];
        assert!(matches!(DetailLevels::new(&lod), Err(TerrainError::UnsupportedLod { .. })));
    }
}
