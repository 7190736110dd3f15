//! Vantage-point tree: exact space-partitioning index.
//!
//! Recursively partitions the dataset around a randomly chosen pivot and
//! the median distance to it: objects inside the median ball go to the
//! "inside" child, the rest to the "outside" child, down to leaf buckets.
//! Search prunes a child whenever the query ball cannot intersect that
//! child's distance range from the pivot (triangle-inequality pruning).
//!
//! Exactness holds under a true metric space with the default parameters.
//! Two knobs trade exactness for speed: the `alphaLeft`/`alphaRight`
//! stretch factors tighten the two pruning tests, and `maxLeavesToVisit`
//! caps how many leaf buckets a single search may scan.

use crate::dataset::{DataObject, Dataset};
use crate::error::{ProximaError, Result};
use crate::index::traits::Index;
use crate::params::{AnyParams, ParamReader};
use crate::query::{KnnQuery, RangeQuery};
use crate::space::Space;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::info;

/// Registered method name.
pub const METHOD_NAME: &str = "vptree";

/// Build-time parameter keys, rejected with `ImmutableParam` at query time.
const BUILD_TIME_KEYS: &[&str] = &["bucketSize", "alphaLeft", "alphaRight", "seed"];

/// VP-tree node.
enum Node {
    /// Internal node: pivot, median ball radius, and the two children.
    Internal {
        pivot: DataObject,
        median: f32,
        inside: Box<Node>,
        outside: Box<Node>,
    },
    /// Leaf node: a small bucket scanned exhaustively.
    Leaf { bucket: Vec<DataObject> },
}

/// Pruning stretch factors, consulted on every internal node during search.
#[derive(Clone, Copy, Debug)]
struct VpTreeParams {
    alpha_left: f32,
    alpha_right: f32,
}

/// Exact partitioning tree over a metric space.
pub struct VpTreeIndex {
    root: Node,
    params: VpTreeParams,
    /// Query-time: leaf-visit budget per search, 0 = unlimited.
    max_leaves_to_visit: usize,
}

/// Constructor entry point for the method registry.
pub fn create(
    verbose: bool,
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: &AnyParams,
) -> Result<Box<dyn Index>> {
    Ok(Box::new(VpTreeIndex::new(verbose, space, dataset, params)?))
}

impl VpTreeIndex {
    /// Build a VP-tree.
    ///
    /// Build-time parameters: `bucketSize` (default 16), `alphaLeft` /
    /// `alphaRight` (default 1.0; values above 1.0 prune more aggressively
    /// and forfeit exactness), `seed` (pivot selection, default 0).
    /// Query-time: `maxLeavesToVisit` (default 0 = unlimited).
    pub fn new(
        verbose: bool,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &AnyParams,
    ) -> Result<Self> {
        dataset.require_min_objects(2)?;

        let mut reader = ParamReader::new(params);
        let bucket_size = reader.get_usize("bucketSize", 16)?;
        let alpha_left = reader.get_f32("alphaLeft", 1.0)?;
        let alpha_right = reader.get_f32("alphaRight", 1.0)?;
        let seed = reader.get_u64("seed", 0)?;
        let max_leaves_to_visit = reader.get_usize("maxLeavesToVisit", 0)?;
        reader.check_unclaimed(METHOD_NAME)?;

        if bucket_size == 0 {
            return Err(ProximaError::invalid_param("bucketSize must be >= 1"));
        }
        if alpha_left <= 0.0 || alpha_right <= 0.0 {
            return Err(ProximaError::invalid_param(
                "alphaLeft and alphaRight must be > 0",
            ));
        }

        let params = VpTreeParams {
            alpha_left,
            alpha_right,
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let objects: Vec<DataObject> = dataset.iter().cloned().collect();
        let root = build_node(space.as_ref(), objects, bucket_size, &mut rng);

        if verbose {
            info!(
                method = METHOD_NAME,
                space = space.name(),
                objects = dataset.len(),
                bucket_size,
                "vp-tree built"
            );
        }

        Ok(Self {
            root,
            params,
            max_leaves_to_visit,
        })
    }

    /// Remaining-leaf budget for one search: `None` means unlimited.
    fn leaf_budget(&self) -> Option<usize> {
        (self.max_leaves_to_visit != 0).then_some(self.max_leaves_to_visit)
    }
}

/// Recursively partition `objects` into a node.
fn build_node(
    space: &dyn Space,
    mut objects: Vec<DataObject>,
    bucket_size: usize,
    rng: &mut StdRng,
) -> Node {
    if objects.len() <= bucket_size {
        return Node::Leaf { bucket: objects };
    }

    let pivot = objects.swap_remove(rng.gen_range(0..objects.len()));

    let mut scored: Vec<(f32, DataObject)> = objects
        .into_iter()
        .map(|object| (space.distance(&object, &pivot), object))
        .collect();

    // Median split: distances <= median go inside the ball.
    let mid = (scored.len() - 1) / 2;
    scored.select_nth_unstable_by(mid, |a, b| a.0.total_cmp(&b.0));
    let median = scored[mid].0;

    let mut inside = Vec::with_capacity(mid + 1);
    let mut outside = Vec::with_capacity(scored.len() - mid - 1);
    for (distance, object) in scored {
        if distance <= median {
            inside.push(object);
        } else {
            outside.push(object);
        }
    }

    // Degenerate split (many equal distances): fall back to a leaf rather
    // than recursing forever on one side.
    if inside.is_empty() || outside.is_empty() {
        let mut bucket: Vec<DataObject> = inside;
        bucket.extend(outside);
        bucket.push(pivot);
        return Node::Leaf { bucket };
    }

    Node::Internal {
        pivot,
        median,
        inside: Box::new(build_node(space, inside, bucket_size, rng)),
        outside: Box::new(build_node(space, outside, bucket_size, rng)),
    }
}

/// Which children the query ball can reach, given the pivot distance `d`,
/// the median, the pruning radius `r`, and the stretch factors.
///
/// With alphas at 1.0 these are the exact triangle-inequality tests:
/// the inside child holds distances in [0, median], so it intersects the
/// query ball iff `d - r <= median`; the outside child holds distances in
/// [median, inf), intersecting iff `d + r >= median`. Raising an alpha
/// scales the corresponding overlap requirement, pruning earlier.
fn reachable(d: f32, median: f32, r: f32, alpha_left: f32, alpha_right: f32) -> (bool, bool) {
    let inside = alpha_left * (d - median) <= r;
    let outside = alpha_right * (median - d) <= r;
    (inside, outside)
}

enum Visitor<'a, 'q> {
    Knn(&'a mut KnnQuery),
    Range(&'q mut RangeQuery),
}

impl Visitor<'_, '_> {
    fn check_and_add(&mut self, object: &DataObject) {
        match self {
            Visitor::Knn(q) => {
                q.check_and_add(object);
            }
            Visitor::Range(q) => {
                q.check_and_add(object);
            }
        }
    }

    /// Offer an already-computed distance, avoiding a second evaluation.
    fn add(&mut self, distance: f32, object: &DataObject) {
        match self {
            Visitor::Knn(q) => {
                q.add(distance, object);
            }
            Visitor::Range(q) => {
                q.add(distance, object);
            }
        }
    }

    fn distance_to(&self, object: &DataObject) -> f32 {
        match self {
            Visitor::Knn(q) => q.distance_to(object),
            Visitor::Range(q) => q.distance_to(object),
        }
    }

    fn radius(&self) -> f32 {
        match self {
            Visitor::Knn(q) => q.radius(),
            Visitor::Range(q) => q.radius(),
        }
    }
}

fn traverse(
    node: &Node,
    visitor: &mut Visitor<'_, '_>,
    params: &VpTreeParams,
    leaves_left: &mut Option<usize>,
) {
    if matches!(leaves_left, Some(0)) {
        return;
    }

    match node {
        Node::Leaf { bucket } => {
            if let Some(budget) = leaves_left {
                *budget -= 1;
            }
            for object in bucket {
                visitor.check_and_add(object);
            }
        }
        Node::Internal {
            pivot,
            median,
            inside,
            outside,
        } => {
            let d = visitor.distance_to(pivot);
            visitor.add(d, pivot);

            // Nearer child first: for KNN the accumulator radius shrinks as
            // better candidates arrive, so good candidates early mean more
            // pruning later.
            let first_inside = d <= *median;
            for inside_turn in [first_inside, !first_inside] {
                let r = visitor.radius();
                let (reach_in, reach_out) =
                    reachable(d, *median, r, params.alpha_left, params.alpha_right);
                let (child, reach) = if inside_turn {
                    (inside, reach_in)
                } else {
                    (outside, reach_out)
                };
                if reach {
                    traverse(child, visitor, params, leaves_left);
                }
            }
        }
    }
}

impl Index for VpTreeIndex {
    fn name(&self) -> &str {
        METHOD_NAME
    }

    fn search_knn(&self, query: &mut KnnQuery) -> Result<()> {
        let mut leaves_left = self.leaf_budget();
        traverse(
            &self.root,
            &mut Visitor::Knn(query),
            &self.params,
            &mut leaves_left,
        );
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery) -> Result<()> {
        let mut leaves_left = self.leaf_budget();
        traverse(
            &self.root,
            &mut Visitor::Range(query),
            &self.params,
            &mut leaves_left,
        );
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &AnyParams) -> Result<()> {
        for key in BUILD_TIME_KEYS {
            if params.contains(key) {
                return Err(ProximaError::immutable_param(METHOD_NAME, *key));
            }
        }

        let mut reader = ParamReader::new(params);
        let max_leaves = reader.get_usize("maxLeavesToVisit", self.max_leaves_to_visit)?;
        reader.check_unclaimed(METHOD_NAME)?;

        self.max_leaves_to_visit = max_leaves;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::index::seq_search::SeqSearchIndex;
    use crate::space::VectorSpace;

    fn l2() -> Arc<dyn Space> {
        Arc::new(VectorSpace::new(DistanceMetric::Euclidean))
    }

    fn random_dataset(n: usize, dim: usize) -> Arc<Dataset> {
        Arc::new(Dataset::random(n, dim))
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let dataset = random_dataset(300, 8);
        let tree = VpTreeIndex::new(false, l2(), dataset.clone(), &AnyParams::empty()).unwrap();
        let scan = SeqSearchIndex::new(false, l2(), dataset, &AnyParams::empty()).unwrap();

        for qid in 0..10 {
            let target = DataObject::random(10_000 + qid, 8);

            let mut tree_q = KnnQuery::new(l2(), target.clone(), 10).unwrap();
            tree.search_knn(&mut tree_q).unwrap();

            let mut scan_q = KnnQuery::new(l2(), target, 10).unwrap();
            scan.search_knn(&mut scan_q).unwrap();

            assert_eq!(tree_q.result().sorted(), scan_q.result().sorted());
        }
    }

    #[test]
    fn test_range_matches_brute_force() {
        let dataset = random_dataset(300, 4);
        let tree = VpTreeIndex::new(false, l2(), dataset.clone(), &AnyParams::empty()).unwrap();
        let scan = SeqSearchIndex::new(false, l2(), dataset, &AnyParams::empty()).unwrap();

        let target = DataObject::random(10_000, 4);

        let mut tree_q = RangeQuery::new(l2(), target.clone(), 0.6).unwrap();
        tree.search_range(&mut tree_q).unwrap();

        let mut scan_q = RangeQuery::new(l2(), target, 0.6).unwrap();
        scan.search_range(&mut scan_q).unwrap();

        let mut tree_ids: Vec<u32> = tree_q.result().objects().iter().map(|o| o.id).collect();
        let mut scan_ids: Vec<u32> = scan_q.result().objects().iter().map(|o| o.id).collect();
        tree_ids.sort_unstable();
        scan_ids.sort_unstable();
        assert_eq!(tree_ids, scan_ids);
    }

    #[test]
    fn test_small_bucket_still_exact() {
        let params = AnyParams::parse(&["bucketSize=1"]).unwrap();
        let dataset = random_dataset(100, 4);
        let tree = VpTreeIndex::new(false, l2(), dataset.clone(), &params).unwrap();
        let scan = SeqSearchIndex::new(false, l2(), dataset, &AnyParams::empty()).unwrap();

        let target = DataObject::random(10_000, 4);
        let mut tree_q = KnnQuery::new(l2(), target.clone(), 5).unwrap();
        tree.search_knn(&mut tree_q).unwrap();
        let mut scan_q = KnnQuery::new(l2(), target, 5).unwrap();
        scan.search_knn(&mut scan_q).unwrap();

        assert_eq!(tree_q.result().sorted(), scan_q.result().sorted());
    }

    #[test]
    fn test_identical_objects_build() {
        // Every distance is zero; the degenerate-split fallback must kick in.
        let objects = (0..40).map(|i| DataObject::new(i, vec![1.0, 2.0]));
        let dataset: Arc<Dataset> = Arc::new(objects.collect());
        let params = AnyParams::parse(&["bucketSize=4"]).unwrap();
        let tree = VpTreeIndex::new(false, l2(), dataset, &params).unwrap();

        let mut q = KnnQuery::new(l2(), DataObject::new(999, vec![1.0, 2.0]), 5).unwrap();
        tree.search_knn(&mut q).unwrap();
        assert_eq!(q.result_size(), 5);
        // Tie-break: smallest ids win at distance zero.
        let ids: Vec<u32> = q.result().sorted().iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_build_params() {
        let dataset = random_dataset(10, 4);
        let params = AnyParams::parse(&["bucketSize=0"]).unwrap();
        assert!(matches!(
            VpTreeIndex::new(false, l2(), dataset.clone(), &params).err().unwrap(),
            ProximaError::InvalidParam(_)
        ));

        let params = AnyParams::parse(&["alphaLeft=-1.0"]).unwrap();
        assert!(matches!(
            VpTreeIndex::new(false, l2(), dataset, &params).err().unwrap(),
            ProximaError::InvalidParam(_)
        ));
    }

    #[test]
    fn test_build_time_keys_immutable() {
        let dataset = random_dataset(10, 4);
        let mut tree = VpTreeIndex::new(false, l2(), dataset, &AnyParams::empty()).unwrap();

        let reconf = AnyParams::parse(&["alphaLeft=2.0"]).unwrap();
        assert!(matches!(
            tree.set_query_time_params(&reconf).unwrap_err(),
            ProximaError::ImmutableParam { .. }
        ));

        let reconf = AnyParams::parse(&["maxLeavesToVisit=3"]).unwrap();
        tree.set_query_time_params(&reconf).unwrap();
        assert_eq!(tree.max_leaves_to_visit, 3);
    }

    #[test]
    fn test_leaf_budget_limits_work() {
        let dataset = random_dataset(500, 4);
        let params = AnyParams::parse(&["bucketSize=4"]).unwrap();
        let mut tree = VpTreeIndex::new(false, l2(), dataset, &params).unwrap();
        tree.set_query_time_params(&AnyParams::parse(&["maxLeavesToVisit=1"]).unwrap())
            .unwrap();

        let mut q = KnnQuery::new(l2(), DataObject::random(10_000, 4), 5).unwrap();
        tree.search_knn(&mut q).unwrap();
        // Still returns k results (pivots plus one bucket are enough here),
        // just not necessarily the exact ones.
        assert!(q.result_size() <= 5);
    }
}
