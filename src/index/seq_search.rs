//! Exact sequential-scan index.
//!
//! Computes distances to every object, guaranteeing 100% recall at O(n)
//! search cost. Serves as the ground-truth baseline for the approximate
//! methods. KNN scans are parallelized over chunks with Rayon, each chunk
//! maintaining a bounded local heap before a final merge.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::index::traits::Index;
use crate::params::{AnyParams, ParamReader};
use crate::query::{KnnQuery, RangeQuery};
use crate::space::Space;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::info;

/// Registered method name.
pub const METHOD_NAME: &str = "seq_search";

/// Chunk size for parallel scans; sized to fit multiple vectors in L2 cache.
const CHUNK_SIZE: usize = 1000;

/// A candidate with its computed distance, used for heap operations.
///
/// Max-at-top by (distance, id), so `peek` gives the current worst and
/// equal-distance ties keep the smaller id, matching the query accumulator.
#[derive(Clone)]
struct ScoredObject {
    id: u32,
    pos: usize,
    distance: f32,
}

impl PartialEq for ScoredObject {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}

impl Eq for ScoredObject {}

impl PartialOrd for ScoredObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredObject {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Exact linear-scan index over a dataset.
pub struct SeqSearchIndex {
    dataset: Arc<Dataset>,
}

/// Constructor entry point for the method registry.
pub fn create(
    verbose: bool,
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: &AnyParams,
) -> Result<Box<dyn Index>> {
    Ok(Box::new(SeqSearchIndex::new(verbose, space, dataset, params)?))
}

impl SeqSearchIndex {
    /// Build a sequential-scan index. Takes no parameters.
    pub fn new(
        verbose: bool,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &AnyParams,
    ) -> Result<Self> {
        dataset.require_min_objects(2)?;
        ParamReader::new(params).check_unclaimed(METHOD_NAME)?;

        if verbose {
            info!(
                method = METHOD_NAME,
                space = space.name(),
                objects = dataset.len(),
                "sequential scan ready"
            );
        }

        Ok(Self { dataset })
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the index holds no objects.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    fn push_bounded(heap: &mut BinaryHeap<ScoredObject>, k: usize, candidate: ScoredObject) {
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(worst) = heap.peek() {
            if candidate.cmp(worst) == Ordering::Less {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    fn scan_top_k(&self, query: &KnnQuery) -> Vec<ScoredObject> {
        let k = query.k();
        let objects = self.dataset.as_slice();

        let merged = objects
            .par_chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let base = chunk_idx * CHUNK_SIZE;
                let mut local: BinaryHeap<ScoredObject> = BinaryHeap::with_capacity(k + 1);
                for (offset, object) in chunk.iter().enumerate() {
                    let candidate = ScoredObject {
                        id: object.id,
                        pos: base + offset,
                        distance: query.distance_to(object),
                    };
                    Self::push_bounded(&mut local, k, candidate);
                }
                local
            })
            .reduce(
                || BinaryHeap::with_capacity(k + 1),
                |mut a, b| {
                    for item in b {
                        Self::push_bounded(&mut a, k, item);
                    }
                    a
                },
            );

        let mut winners: Vec<ScoredObject> = merged.into_iter().collect();
        winners.sort_by(|a, b| a.cmp(b));
        winners
    }
}

impl Index for SeqSearchIndex {
    fn name(&self) -> &str {
        METHOD_NAME
    }

    fn search_knn(&self, query: &mut KnnQuery) -> Result<()> {
        for winner in self.scan_top_k(query) {
            query.add(winner.distance, &self.dataset[winner.pos]);
        }
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery) -> Result<()> {
        let objects = self.dataset.as_slice();

        // Parallel filter; rayon's indexed collect preserves chunk order,
        // so matches arrive in dataset position order.
        let matches: Vec<(usize, f32)> = objects
            .par_chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(chunk_idx, chunk)| {
                let base = chunk_idx * CHUNK_SIZE;
                chunk
                    .iter()
                    .enumerate()
                    .filter_map(|(offset, object)| {
                        let distance = query.distance_to(object);
                        (distance <= query.radius()).then_some((base + offset, distance))
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();

        for (pos, distance) in matches {
            query.add(distance, &self.dataset[pos]);
        }
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &AnyParams) -> Result<()> {
        // No tunable parameters; only the empty set is accepted.
        ParamReader::new(params).check_unclaimed(METHOD_NAME)
    }
}
