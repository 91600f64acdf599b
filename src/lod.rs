//! Level-of-detail table and selection policy. Each level pairs a downscale
//! factor φ with the largest fit-relative viewport scale ψ it should serve;
//! level 0 is the coarsest.

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LodLevel {
    /// φ: factor applied to the source dimensions, in (0, 1].
    pub downscale: f64,
    /// ψ: the largest relative scale this level still serves.
    pub max_relative_scale: f64,
}

/// The built-in table: eighth, quarter, half and full resolution.
pub fn default_levels() -> Vec<LodLevel> {
    vec![
        LodLevel {
            downscale: 0.125,
            max_relative_scale: 0.25,
        },
        LodLevel {
            downscale: 0.25,
            max_relative_scale: 0.5,
        },
        LodLevel {
            downscale: 0.5,
            max_relative_scale: 1.0,
        },
        LodLevel {
            downscale: 1.0,
            max_relative_scale: f64::INFINITY,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct LodTable {
    levels: Vec<LodLevel>,
}

impl Default for LodTable {
    fn default() -> Self {
        Self {
            levels: default_levels(),
        }
    }
}

impl LodTable {
    /// Validates monotonicity of φ and ψ and the φ ∈ (0, 1] range.
    pub fn new(levels: Vec<LodLevel>) -> Result<Self, Error> {
        if levels.is_empty() {
            return Err(Error::InvalidConfig("lod-levels must not be empty".into()));
        }
        for (index, level) in levels.iter().enumerate() {
            if !(level.downscale > 0.0 && level.downscale <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "lod-levels[{index}] downscale {} must be in (0, 1]",
                    level.downscale
                )));
            }
            if level.max_relative_scale <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "lod-levels[{index}] max-relative-scale {} must be positive",
                    level.max_relative_scale
                )));
            }
            if index > 0 {
                let previous = &levels[index - 1];
                if level.downscale < previous.downscale
                    || level.max_relative_scale < previous.max_relative_scale
                {
                    return Err(Error::InvalidConfig(format!(
                        "lod-levels[{index}] must not decrease in downscale or max-relative-scale"
                    )));
                }
            }
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> LodLevel {
        self.levels[index.min(self.levels.len() - 1)]
    }

    /// Smallest level whose ψ still covers the (pressure-modified) relative
    /// scale; the finest level catches everything beyond the table. The
    /// modifier scales the relative scale down before lookup, so pressure
    /// shifts the choice toward coarser levels.
    pub fn select(&self, relative_scale: f64, modifier: f64) -> usize {
        let effective = relative_scale * modifier;
        self.levels
            .iter()
            .position(|level| effective <= level.max_relative_scale)
            .unwrap_or(self.levels.len() - 1)
    }
}

/// A level's texture dimensions: φ applied to the source, then clamped to
/// the largest allowed dimension (proportionally) and to the per-texture
/// byte cap (by √ratio), both preserving aspect.
pub fn target_size(
    source_w: u32,
    source_h: u32,
    downscale: f64,
    max_dimension: u32,
    max_bytes: u64,
) -> (u32, u32) {
    let mut w = (f64::from(source_w) * downscale).round().max(1.0);
    let mut h = (f64::from(source_h) * downscale).round().max(1.0);

    let max_dim = f64::from(max_dimension.max(1));
    let largest = w.max(h);
    if largest > max_dim {
        let shrink = max_dim / largest;
        w = (w * shrink).floor().max(1.0);
        h = (h * shrink).floor().max(1.0);
    }

    let bytes = 4.0 * w * h;
    if bytes > max_bytes as f64 {
        let shrink = (max_bytes as f64 / bytes).sqrt();
        w = (w * shrink).floor().max(1.0);
        h = (h * shrink).floor().max(1.0);
    }

    (w as u32, h as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_walks_the_table() {
        let table = LodTable::default();
        assert_eq!(table.select(0.2, 1.0), 0);
        assert_eq!(table.select(0.4, 1.0), 1);
        assert_eq!(table.select(1.0, 1.0), 2);
        assert_eq!(table.select(4.0, 1.0), 3);
    }

    #[test]
    fn selection_is_monotone_in_relative_scale() {
        let table = LodTable::default();
        let mut last = 0;
        for step in 0..200 {
            let r = 0.05 + step as f64 * 0.05;
            let level = table.select(r, 1.0);
            assert!(level >= last, "selection regressed at r={r}");
            last = level;
        }
    }

    #[test]
    fn pressure_modifier_selects_coarser_levels() {
        let table = LodTable::default();
        // At r = 0.4 the unmodified policy wants level 1; halving the
        // effective scale drops it to the coarsest level.
        assert_eq!(table.select(0.4, 1.0), 1);
        assert_eq!(table.select(0.4, 0.5), 0);
    }

    #[test]
    fn relative_scale_past_the_table_uses_the_finest_level() {
        let table = LodTable::new(vec![
            LodLevel {
                downscale: 0.5,
                max_relative_scale: 1.0,
            },
            LodLevel {
                downscale: 1.0,
                max_relative_scale: 4.0,
            },
        ])
        .unwrap();
        assert_eq!(table.select(100.0, 1.0), 1);
    }

    #[test]
    fn validation_rejects_non_monotone_tables() {
        let err = LodTable::new(vec![
            LodLevel {
                downscale: 0.5,
                max_relative_scale: 1.0,
            },
            LodLevel {
                downscale: 0.25,
                max_relative_scale: 2.0,
            },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_downscale() {
        assert!(
            LodTable::new(vec![LodLevel {
                downscale: 1.5,
                max_relative_scale: 1.0,
            }])
            .is_err()
        );
        assert!(
            LodTable::new(vec![LodLevel {
                downscale: 0.0,
                max_relative_scale: 1.0,
            }])
            .is_err()
        );
    }

    #[test]
    fn target_size_applies_phi() {
        assert_eq!(target_size(8000, 6000, 0.5, 16384, u64::MAX), (4000, 3000));
    }

    #[test]
    fn target_size_respects_dimension_cap() {
        let (w, h) = target_size(8000, 6000, 1.0, 2048, u64::MAX);
        assert_eq!(w, 2048);
        assert_eq!(h, 1536);
    }

    #[test]
    fn target_size_respects_byte_cap() {
        // 2000×2000 RGBA8 is 16 MB; capping at 4 MB shrinks each side by √¼.
        let (w, h) = target_size(2000, 2000, 1.0, 16384, 4_000_000);
        assert_eq!((w, h), (1000, 1000));
        assert!(u64::from(w) * u64::from(h) * 4 <= 4_000_000);
    }
}
