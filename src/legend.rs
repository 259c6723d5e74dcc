//! Acute-count buckets for a color legend
//!
//! The renderer colors generators by acute count range. This module only
//! owns the bucketing; colors and widgets belong to the renderer.

use serde::{Deserialize, Serialize};

use crate::pipeline::GeneratorSnapshot;

/// Default inclusive upper bounds; counts above the last go to an overflow bucket
pub const DEFAULT_BUCKET_BOUNDS: [u32; 5] = [0, 2, 5, 10, 20];

/// Ascending inclusive upper bounds for acute-count buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcuteLegend {
    bounds: Vec<u32>,
}

impl Default for AcuteLegend {
    fn default() -> Self {
        Self {
            bounds: DEFAULT_BUCKET_BOUNDS.to_vec(),
        }
    }
}

impl AcuteLegend {
    /// Build from upper bounds; they are sorted and deduplicated
    pub fn new(mut bounds: Vec<u32>) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        Self { bounds }
    }

    /// Number of buckets, including the overflow bucket
    pub fn bucket_count(&self) -> usize {
        self.bounds.len() + 1
    }

    /// Bucket index for an acute count
    pub fn bucket(&self, acute_count: u32) -> usize {
        self.bounds.partition_point(|&bound| bound < acute_count)
    }

    /// Display label per bucket, e.g. `"0"`, `"1-2"`, `"21+"`
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.bucket_count());
        let mut low = 0u32;
        for &high in &self.bounds {
            if low == high {
                labels.push(format!("{high}"));
            } else {
                labels.push(format!("{low}-{high}"));
            }
            low = high.saturating_add(1);
        }
        labels.push(format!("{low}+"));
        labels
    }

    /// Generators per bucket
    pub fn histogram(&self, snapshot: &[GeneratorSnapshot]) -> Vec<u32> {
        let mut counts = vec![0u32; self.bucket_count()];
        for generator in snapshot {
            counts[self.bucket(generator.acute_count)] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn snapshot(acute_count: u32) -> GeneratorSnapshot {
        GeneratorSnapshot {
            position: Vec3::ZERO,
            centroid: Vec3::ZERO,
            acute_count,
            voxel_count: 1,
        }
    }

    #[test]
    fn default_labels() {
        let legend = AcuteLegend::default();
        assert_eq!(legend.labels(), vec!["0", "1-2", "3-5", "6-10", "11-20", "21+"]);
        assert_eq!(legend.bucket_count(), 6);
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        let legend = AcuteLegend::default();
        assert_eq!(legend.bucket(0), 0);
        assert_eq!(legend.bucket(1), 1);
        assert_eq!(legend.bucket(2), 1);
        assert_eq!(legend.bucket(3), 2);
        assert_eq!(legend.bucket(20), 4);
        assert_eq!(legend.bucket(21), 5);
        assert_eq!(legend.bucket(500), 5);
    }

    #[test]
    fn histogram_counts_every_generator() {
        let legend = AcuteLegend::new(vec![4, 1, 4]);
        let generators: Vec<_> = [0, 1, 2, 4, 9, 9].into_iter().map(snapshot).collect();
        assert_eq!(legend.labels(), vec!["0-1", "2-4", "5+"]);
        assert_eq!(legend.histogram(&generators), vec![2, 2, 2]);
    }
}
