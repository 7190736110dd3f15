//! Queries and their result accumulators.
//!
//! A query owns the object it searches for plus a mutable accumulator, and
//! is reusable: [`KnnQuery::reset`] / [`RangeQuery::reset`] clear accumulated
//! state (keeping allocations) so the same query can be issued again against
//! the same or a different index. A query instance is not safe for
//! concurrent use; each thread owns its own.

use crate::dataset::DataObject;
use crate::space::Space;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// An accumulated candidate, ordered so the heap's top is the current worst.
///
/// Ordering is by distance, then by id: among equal distances the larger id
/// is considered "worse". This makes the tie-break rule explicit — when a
/// candidate ties the current k-th best distance at capacity, the smaller id
/// keeps its place.
#[derive(Clone, Debug)]
struct KnnEntry {
    distance: f32,
    object: DataObject,
}

impl PartialEq for KnnEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.object.id == other.object.id
    }
}

impl Eq for KnnEntry {}

impl PartialOrd for KnnEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KnnEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.object.id.cmp(&other.object.id))
    }
}

/// Bounded best-K accumulator: a max-at-top priority structure holding the
/// K smallest distances seen so far.
///
/// Reading through [`top_object`](Self::top_object) /
/// [`top_distance`](Self::top_distance) / [`pop`](Self::pop) drains from the
/// worst end, matching the underlying heap. Cloning the accumulator before
/// draining it is the documented way to read results non-destructively.
#[derive(Clone)]
pub struct KnnResult {
    heap: BinaryHeap<KnnEntry>,
    k: usize,
}

impl KnnResult {
    fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    /// Offer a candidate. Returns true if it was retained.
    ///
    /// Callers must offer each object at most once per search; the
    /// accumulator does not deduplicate.
    fn add(&mut self, distance: f32, object: DataObject) -> bool {
        let entry = KnnEntry { distance, object };
        if self.heap.len() < self.k {
            self.heap.push(entry);
            return true;
        }
        // At capacity: replace the worst only if strictly better under the
        // (distance, id) order, so equal-distance residents with smaller ids
        // are never evicted.
        match self.heap.peek() {
            Some(worst) if entry.cmp(worst) == Ordering::Less => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    /// The current pruning radius: the K-th best distance once the
    /// accumulator is full, infinity before that.
    pub fn radius(&self) -> f32 {
        if self.heap.len() < self.k {
            f32::INFINITY
        } else {
            self.heap.peek().map_or(f32::INFINITY, |e| e.distance)
        }
    }

    /// The object with the largest retained distance.
    pub fn top_object(&self) -> Option<&DataObject> {
        self.heap.peek().map(|e| &e.object)
    }

    /// The largest retained distance.
    pub fn top_distance(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.distance)
    }

    /// Remove and return the worst retained candidate.
    pub fn pop(&mut self) -> Option<(DataObject, f32)> {
        self.heap.pop().map(|e| (e.object, e.distance))
    }

    /// Number of retained candidates.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no candidates are retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Retained candidates as `(id, distance)` sorted by ascending distance
    /// (ties by ascending id). Non-destructive.
    pub fn sorted(&self) -> Vec<(u32, f32)> {
        let mut out: Vec<&KnnEntry> = self.heap.iter().collect();
        out.sort_by(|a, b| a.cmp(b));
        out.iter().map(|e| (e.object.id, e.distance)).collect()
    }

    fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Unbounded range-query accumulator, ordered by discovery.
#[derive(Clone, Default)]
pub struct RangeResult {
    objects: Vec<DataObject>,
    distances: Vec<f32>,
}

impl RangeResult {
    /// Matched objects in discovery order.
    pub fn objects(&self) -> &[DataObject] {
        &self.objects
    }

    /// Matched distances, parallel to [`objects`](Self::objects).
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// The i-th match as `(object, distance)`.
    pub fn get(&self, i: usize) -> Option<(&DataObject, f32)> {
        Some((self.objects.get(i)?, self.distances[i]))
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether there are no matches.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.distances.clear();
    }
}

/// A k-nearest-neighbor query bound to a space and a query object.
pub struct KnnQuery {
    space: Arc<dyn Space>,
    object: DataObject,
    k: usize,
    result: KnnResult,
}

impl KnnQuery {
    /// Create a KNN query. Fails with `InvalidParam` unless `k >= 1`.
    pub fn new(space: Arc<dyn Space>, object: DataObject, k: usize) -> crate::Result<Self> {
        if k < 1 {
            return Err(crate::ProximaError::invalid_param(format!(
                "K must be >= 1, got {k}"
            )));
        }
        Ok(Self {
            space,
            object,
            k,
            result: KnnResult::new(k),
        })
    }

    /// The bound query object.
    pub fn object(&self) -> &DataObject {
        &self.object
    }

    /// The requested result cardinality.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Distance from a data object to the query object.
    pub fn distance_to(&self, object: &DataObject) -> f32 {
        self.space.distance(object, &self.object)
    }

    /// The current shrinking pruning radius.
    pub fn radius(&self) -> f32 {
        self.result.radius()
    }

    /// Compute the distance to `object` and offer it to the accumulator.
    /// Returns true if it was retained.
    pub fn check_and_add(&mut self, object: &DataObject) -> bool {
        let distance = self.distance_to(object);
        self.result.add(distance, object.clone())
    }

    /// Offer an already-computed distance. Returns true if retained.
    pub fn add(&mut self, distance: f32, object: &DataObject) -> bool {
        self.result.add(distance, object.clone())
    }

    /// The accumulated result.
    pub fn result(&self) -> &KnnResult {
        &self.result
    }

    /// Number of accumulated results.
    pub fn result_size(&self) -> usize {
        self.result.len()
    }

    /// Clear accumulated state, preserving the bound object and K, so the
    /// query can be issued again.
    pub fn reset(&mut self) {
        self.result.clear();
    }
}

/// A fixed-radius range query bound to a space and a query object.
pub struct RangeQuery {
    space: Arc<dyn Space>,
    object: DataObject,
    radius: f32,
    result: RangeResult,
}

impl RangeQuery {
    /// Create a range query. Fails with `InvalidParam` unless
    /// `radius >= 0.0`.
    pub fn new(space: Arc<dyn Space>, object: DataObject, radius: f32) -> crate::Result<Self> {
        if !(radius >= 0.0) {
            return Err(crate::ProximaError::invalid_param(format!(
                "radius must be >= 0, got {radius}"
            )));
        }
        Ok(Self {
            space,
            object,
            radius,
            result: RangeResult::default(),
        })
    }

    /// The bound query object.
    pub fn object(&self) -> &DataObject {
        &self.object
    }

    /// The query radius.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Distance from a data object to the query object.
    pub fn distance_to(&self, object: &DataObject) -> f32 {
        self.space.distance(object, &self.object)
    }

    /// Compute the distance to `object` and record it if within the radius.
    /// Returns true if it matched.
    pub fn check_and_add(&mut self, object: &DataObject) -> bool {
        let distance = self.distance_to(object);
        self.add(distance, object)
    }

    /// Offer an already-computed distance. Returns true if it matched.
    pub fn add(&mut self, distance: f32, object: &DataObject) -> bool {
        if distance <= self.radius {
            self.result.objects.push(object.clone());
            self.result.distances.push(distance);
            true
        } else {
            false
        }
    }

    /// The accumulated result.
    pub fn result(&self) -> &RangeResult {
        &self.result
    }

    /// Number of accumulated results.
    pub fn result_size(&self) -> usize {
        self.result.len()
    }

    /// Clear accumulated state, preserving the bound object and radius.
    pub fn reset(&mut self) {
        self.result.clear();
    }
}

/// Runtime query variant handed to [`Index::search`](crate::index::Index::search).
pub enum Query<'a> {
    /// Fixed-cardinality nearest-neighbor query.
    Knn(&'a mut KnnQuery),
    /// Fixed-radius query.
    Range(&'a mut RangeQuery),
}

impl Query<'_> {
    /// Variant name for logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Query::Knn(_) => "knn",
            Query::Range(_) => "range",
        }
    }
}
