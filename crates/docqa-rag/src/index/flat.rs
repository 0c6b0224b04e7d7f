//! Exact brute-force index

use rayon::prelude::*;
use simsimd::SpatialSimilarity;

use super::{SearchHit, SimilarityIndex};
use crate::config::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::ChunkId;

/// Flat index: every search scans every entry.
///
/// Scans over more than `parallel_threshold` entries are split across the
/// rayon pool.
pub struct FlatIndex {
    dimensions: usize,
    metric: DistanceMetric,
    parallel_threshold: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            parallel_threshold: 4096,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let d = match self.metric {
            DistanceMetric::Euclidean => <f32 as SpatialSimilarity>::sqeuclidean(a, b),
            DistanceMetric::Cosine => <f32 as SpatialSimilarity>::cos(a, b),
        };
        match d {
            Some(d) => d as f32,
            None => scalar_distance(self.metric, a, b),
        }
    }
}

/// Portable fallback when the SIMD kernel rejects its input
fn scalar_distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                1.0
            } else {
                1.0 - dot / (na * nb)
            }
        }
    }
}

fn by_distance_then_id(a: &SearchHit, b: &SearchHit) -> std::cmp::Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

impl SimilarityIndex for FlatIndex {
    fn rebuild(&mut self, entries: &mut dyn Iterator<Item = (ChunkId, &[f32])>) {
        self.ids.clear();
        self.vectors.clear();
        for (id, embedding) in entries {
            self.ids.push(id);
            self.vectors.push(embedding.to_vec());
        }
    }

    fn insert(&mut self, id: ChunkId, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::invalid(format!(
                "embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }
        self.ids.push(id);
        self.vectors.push(embedding.to_vec());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 || self.ids.is_empty() {
            return Vec::new();
        }

        let score = |(id, vector): (&ChunkId, &Vec<f32>)| SearchHit {
            id: *id,
            distance: self.distance(query, vector),
        };

        let mut hits: Vec<SearchHit> = if self.ids.len() > self.parallel_threshold {
            self.ids.par_iter().zip(self.vectors.par_iter()).map(score).collect()
        } else {
            self.ids.iter().zip(self.vectors.iter()).map(score).collect()
        };

        if hits.len() > k {
            hits.select_nth_unstable_by(k - 1, by_distance_then_id);
            hits.truncate(k);
        }
        hits.sort_by(by_distance_then_id);
        hits
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn name(&self) -> &str {
        "flat"
    }
}
