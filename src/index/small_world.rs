//! Navigable small-world proximity graph (flat, single layer).
//!
//! Objects are inserted one at a time; each insertion runs a handful of
//! greedy beam searches through the graph built so far, then links the new
//! node bidirectionally to its best `NN` neighbors. Insertion order shapes
//! the final topology (and with parallel workers the order is
//! non-deterministic), which affects approximation quality but never
//! correctness of a search.
//!
//! Only KNN queries are supported; range queries fail with
//! `UnsupportedQueryType`. Results are approximate with no exactness
//! guarantee.

use crate::dataset::{DataObject, Dataset};
use crate::error::{ProximaError, Result};
use crate::index::traits::Index;
use crate::params::{AnyParams, ParamReader};
use crate::query::KnnQuery;
use crate::space::Space;
use parking_lot::RwLock;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::info;

/// Registered method name.
pub const METHOD_NAME: &str = "small_world_rand";

/// Build-time parameter keys, rejected with `ImmutableParam` at query time.
const BUILD_TIME_KEYS: &[&str] = &["NN", "initIndexAttempts", "indexThreadQty"];

/// Node identifier within the graph (= dataset position).
type NodeId = usize;

/// A node with its computed distance, used for heap operations.
#[derive(Clone, Copy)]
struct ScoredNode {
    id: NodeId,
    distance: f32,
}

impl PartialEq for ScoredNode {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for ScoredNode {}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.distance.partial_cmp(&other.distance)
    }
}

impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Flat small-world graph index.
pub struct SmallWorldIndex {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    /// Per-node adjacency, locked individually so parallel insertions can
    /// mutate neighbor lists without lost updates.
    neighbors: Vec<RwLock<SmallVec<[u32; 16]>>>,
    /// Target degree for new nodes.
    nn: usize,
    /// Greedy searches per insertion.
    init_index_attempts: usize,
    /// Query-time: greedy walks per search.
    init_search_attempts: usize,
}

/// Constructor entry point for the method registry.
pub fn create(
    verbose: bool,
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: &AnyParams,
) -> Result<Box<dyn Index>> {
    Ok(Box::new(SmallWorldIndex::new(verbose, space, dataset, params)?))
}

impl SmallWorldIndex {
    /// Build a small-world graph.
    ///
    /// Build-time parameters: `NN` (target degree, default 10),
    /// `initIndexAttempts` (default 2), `indexThreadQty` (parallel insertion
    /// workers, default 1). Query-time: `initSearchAttempts` (default 2).
    pub fn new(
        verbose: bool,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &AnyParams,
    ) -> Result<Self> {
        dataset.require_min_objects(2)?;

        let mut reader = ParamReader::new(params);
        let nn = reader.get_usize("NN", 10)?;
        let init_index_attempts = reader.get_usize("initIndexAttempts", 2)?;
        let index_thread_qty = reader.get_usize("indexThreadQty", 1)?;
        let init_search_attempts = reader.get_usize("initSearchAttempts", 2)?;
        reader.check_unclaimed(METHOD_NAME)?;

        if nn == 0 || init_index_attempts == 0 || init_search_attempts == 0 {
            return Err(ProximaError::invalid_param(
                "NN, initIndexAttempts and initSearchAttempts must be >= 1",
            ));
        }
        if index_thread_qty == 0 {
            return Err(ProximaError::invalid_param("indexThreadQty must be >= 1"));
        }

        let n = dataset.len();
        let index = Self {
            space,
            neighbors: (0..n).map(|_| RwLock::new(SmallVec::new())).collect(),
            dataset,
            nn,
            init_index_attempts,
            init_search_attempts,
        };

        // Seed the graph with enough nodes for the first beam searches to
        // have somewhere to walk, then insert the rest, optionally in
        // parallel. Per-node locks keep concurrent edge updates safe.
        let warmup = (index.nn + 1).min(n);
        for node in 1..warmup {
            index.insert(node);
        }

        if index_thread_qty > 1 && warmup < n {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(index_thread_qty)
                .build()
                .map_err(|e| {
                    ProximaError::invalid_param(format!("indexThreadQty: {e}"))
                })?;
            pool.install(|| {
                (warmup..n).into_par_iter().for_each(|node| index.insert(node));
            });
        } else {
            for node in warmup..n {
                index.insert(node);
            }
        }

        if verbose {
            info!(
                method = METHOD_NAME,
                space = index.space.name(),
                objects = n,
                nn,
                threads = index_thread_qty,
                "small-world graph built"
            );
        }

        Ok(index)
    }

    #[inline]
    fn object(&self, node: NodeId) -> &DataObject {
        &self.dataset[node]
    }

    #[inline]
    fn distance_nodes(&self, a: NodeId, b: NodeId) -> f32 {
        self.space.distance(self.object(a), self.object(b))
    }

    /// Deterministic pseudo-random entry point for attempt `attempt` out of
    /// a graph of `limit` nodes (splitmix-style hash). Deterministic entries
    /// make repeated searches reproducible.
    fn entry_point(salt: usize, attempt: usize, limit: usize) -> NodeId {
        let mut x = (salt as u64)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(attempt as u64 + 1);
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        x ^= x >> 27;
        (x % limit as u64) as NodeId
    }

    /// Link a new node into the graph built so far.
    fn insert(&self, node: NodeId) {
        let limit = node; // only earlier nodes are guaranteed present
        if limit == 0 {
            return;
        }

        let mut pool: Vec<ScoredNode> = Vec::new();
        for attempt in 0..self.init_index_attempts {
            let entry = Self::entry_point(node, attempt, limit);
            let found = self.beam_search(
                |candidate| self.distance_nodes(candidate, node),
                entry,
                self.nn,
            );
            pool.extend(found);
        }

        pool.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        pool.dedup_by_key(|c| c.id);

        for candidate in pool.iter().take(self.nn) {
            self.add_edge(node, candidate.id);
            self.add_edge(candidate.id, node);
        }
    }

    /// Append a directed edge; one lock held at a time, never nested.
    fn add_edge(&self, from: NodeId, to: NodeId) {
        let mut list = self.neighbors[from].write();
        let to = to as u32;
        if !list.contains(&to) {
            list.push(to);
        }
    }

    /// Greedy beam search from `entry`, expanding the closest unvisited
    /// candidate until no neighbor improves on the current worst of the
    /// beam. Returns the beam, unordered.
    fn beam_search<F>(&self, distance: F, entry: NodeId, beam_width: usize) -> Vec<ScoredNode>
    where
        F: Fn(NodeId) -> f32,
    {
        let n = self.neighbors.len();
        let mut visited = vec![false; n];
        let mut candidates: BinaryHeap<Reverse<ScoredNode>> =
            BinaryHeap::with_capacity(beam_width * 2);
        let mut results: BinaryHeap<ScoredNode> = BinaryHeap::with_capacity(beam_width + 1);

        let entry_dist = distance(entry);
        visited[entry] = true;
        candidates.push(Reverse(ScoredNode {
            id: entry,
            distance: entry_dist,
        }));
        results.push(ScoredNode {
            id: entry,
            distance: entry_dist,
        });

        while let Some(Reverse(current)) = candidates.pop() {
            let worst_dist = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);
            if current.distance > worst_dist && results.len() >= beam_width {
                break;
            }

            let neighbor_list: SmallVec<[u32; 16]> = self.neighbors[current.id].read().clone();
            for &neighbor in neighbor_list.iter() {
                let neighbor = neighbor as NodeId;
                if visited[neighbor] {
                    continue;
                }
                visited[neighbor] = true;

                let neighbor_dist = distance(neighbor);
                let worst_dist = results.peek().map(|c| c.distance).unwrap_or(f32::MAX);

                if neighbor_dist < worst_dist || results.len() < beam_width {
                    candidates.push(Reverse(ScoredNode {
                        id: neighbor,
                        distance: neighbor_dist,
                    }));
                    results.push(ScoredNode {
                        id: neighbor,
                        distance: neighbor_dist,
                    });
                    if results.len() > beam_width {
                        results.pop();
                    }
                }
            }
        }

        results.into_iter().collect()
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the index holds no objects.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

impl Index for SmallWorldIndex {
    fn name(&self) -> &str {
        METHOD_NAME
    }

    fn search_knn(&self, query: &mut KnnQuery) -> Result<()> {
        let n = self.dataset.len();
        let beam_width = query.k().max(self.nn);
        let attempts = self.init_search_attempts;

        let mut merged: Vec<ScoredNode> = Vec::with_capacity(beam_width * attempts);
        for attempt in 0..attempts {
            // Stride-spaced entry points: deterministic, so re-issuing the
            // identical query yields identical results.
            let entry = (attempt * n) / attempts;
            let found = self.beam_search(
                |candidate| query.distance_to(self.object(candidate)),
                entry,
                beam_width,
            );
            merged.extend(found);
        }

        merged.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        merged.dedup_by_key(|c| c.id);

        for candidate in merged {
            query.add(candidate.distance, self.object(candidate.id));
        }
        Ok(())
    }

    // search_range deliberately not overridden: this graph only answers
    // KNN queries, so the trait default returns UnsupportedQueryType.

    fn set_query_time_params(&mut self, params: &AnyParams) -> Result<()> {
        for key in BUILD_TIME_KEYS {
            if params.contains(key) {
                return Err(ProximaError::immutable_param(METHOD_NAME, *key));
            }
        }

        let mut reader = ParamReader::new(params);
        let attempts = reader.get_usize("initSearchAttempts", self.init_search_attempts)?;
        reader.check_unclaimed(METHOD_NAME)?;

        if attempts == 0 {
            return Err(ProximaError::invalid_param(
                "initSearchAttempts must be >= 1",
            ));
        }
        self.init_search_attempts = attempts;
        Ok(())
    }
}
