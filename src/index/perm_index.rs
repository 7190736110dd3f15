//! Permutation index: pivot-based filtering with incremental selection.
//!
//! Every object is summarized by its *pivot permutation* — the ranking of a
//! fixed pivot set by distance. At query time the query's own permutation is
//! compared against every stored permutation with a cheap rank-correlation
//! distance (Spearman rho), the best `dbScanFrac` fraction of the dataset is
//! shortlisted, and true distances are computed only on the shortlist.
//!
//! `dbScanFrac` is query-time-mutable, trading recall for latency without a
//! rebuild; at 1.0 the shortlist is the whole dataset and range results are
//! exact. Supports both range and KNN queries.

use crate::dataset::{DataObject, Dataset};
use crate::error::{ProximaError, Result};
use crate::index::traits::Index;
use crate::params::{AnyParams, ParamReader};
use crate::query::{KnnQuery, RangeQuery};
use crate::space::Space;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

/// Registered method name.
pub const METHOD_NAME: &str = "perm_incsort";

/// Build-time parameter keys, rejected with `ImmutableParam` at query time.
const BUILD_TIME_KEYS: &[&str] = &["numPivot", "seed"];

/// Pivot-permutation filtering index.
pub struct PermIndex {
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    pivots: Vec<DataObject>,
    /// Per-object pivot permutation: `perms[pos][p]` is the rank of pivot
    /// `p` among all pivots, ordered by distance from object `pos`.
    perms: Vec<Vec<u32>>,
    /// Query-time: fraction of the dataset to scan exactly, in (0, 1].
    db_scan_frac: f32,
}

/// Constructor entry point for the method registry.
pub fn create(
    verbose: bool,
    space: Arc<dyn Space>,
    dataset: Arc<Dataset>,
    params: &AnyParams,
) -> Result<Box<dyn Index>> {
    Ok(Box::new(PermIndex::new(verbose, space, dataset, params)?))
}

impl PermIndex {
    /// Build a permutation index.
    ///
    /// Build-time parameters: `numPivot` (default 16, must not exceed the
    /// dataset size), `seed` (pivot selection, default 0). Query-time:
    /// `dbScanFrac` (default 0.05, in (0, 1]).
    pub fn new(
        verbose: bool,
        space: Arc<dyn Space>,
        dataset: Arc<Dataset>,
        params: &AnyParams,
    ) -> Result<Self> {
        dataset.require_min_objects(2)?;

        let mut reader = ParamReader::new(params);
        let num_pivot = reader.get_usize("numPivot", 16)?;
        let seed = reader.get_u64("seed", 0)?;
        let db_scan_frac = reader.get_f32("dbScanFrac", 0.05)?;
        reader.check_unclaimed(METHOD_NAME)?;

        if num_pivot == 0 || num_pivot > dataset.len() {
            return Err(ProximaError::invalid_param(format!(
                "numPivot must be in [1, {}], got {num_pivot}",
                dataset.len()
            )));
        }
        check_scan_frac(db_scan_frac)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let pivots: Vec<DataObject> = rand::seq::index::sample(&mut rng, dataset.len(), num_pivot)
            .iter()
            .map(|pos| dataset[pos].clone())
            .collect();

        let perms: Vec<Vec<u32>> = dataset
            .iter()
            .map(|object| permutation(space.as_ref(), &pivots, object))
            .collect();

        if verbose {
            info!(
                method = METHOD_NAME,
                space = space.name(),
                objects = dataset.len(),
                pivots = num_pivot,
                "permutation index built"
            );
        }

        Ok(Self {
            space,
            dataset,
            pivots,
            perms,
            db_scan_frac,
        })
    }

    /// Positions of the objects whose permutations are most rank-correlated
    /// with the query object's, in dataset order. The shortlist covers the
    /// `dbScanFrac` fraction of the dataset, but never fewer than `min_scan`
    /// objects: KNN searches pass their `k` so a small scan fraction cannot
    /// shrink the result set below `min(k, n)`.
    fn shortlist(&self, query_object: &DataObject, min_scan: usize) -> Vec<usize> {
        let n = self.dataset.len();
        let query_perm = permutation(self.space.as_ref(), &self.pivots, query_object);

        let mut scored: Vec<(u64, usize)> = self
            .perms
            .iter()
            .enumerate()
            .map(|(pos, perm)| (spearman_rho(perm, &query_perm), pos))
            .collect();

        let frac_qty = (self.db_scan_frac as f64 * n as f64).ceil() as usize;
        let scan_qty = frac_qty.max(min_scan).clamp(1, n);
        if scan_qty < n {
            scored.select_nth_unstable(scan_qty - 1);
            scored.truncate(scan_qty);
        }

        let mut positions: Vec<usize> = scored.into_iter().map(|(_, pos)| pos).collect();
        positions.sort_unstable();
        positions
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

/// Rank each pivot by its distance from `object`: result[p] is the rank of
/// pivot `p` (0 = closest). Ties are broken by pivot position, so
/// permutations are stable.
fn permutation(space: &dyn Space, pivots: &[DataObject], object: &DataObject) -> Vec<u32> {
    let mut order: Vec<(f32, usize)> = pivots
        .iter()
        .enumerate()
        .map(|(p, pivot)| (space.distance(pivot, object), p))
        .collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut ranks = vec![0u32; pivots.len()];
    for (rank, (_, p)) in order.into_iter().enumerate() {
        ranks[p] = rank as u32;
    }
    ranks
}

/// Spearman rho rank-correlation distance: the sum of squared rank
/// differences. Smaller means more similar permutations.
fn spearman_rho(a: &[u32], b: &[u32]) -> u64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i64 - y as i64;
            (d * d) as u64
        })
        .sum()
}

fn check_scan_frac(frac: f32) -> Result<()> {
    if !(frac > 0.0 && frac <= 1.0) {
        return Err(ProximaError::invalid_param(format!(
            "dbScanFrac must be in (0, 1], got {frac}"
        )));
    }
    Ok(())
}

impl Index for PermIndex {
    fn name(&self) -> &str {
        METHOD_NAME
    }

    fn search_knn(&self, query: &mut KnnQuery) -> Result<()> {
        for pos in self.shortlist(query.object(), query.k()) {
            query.check_and_add(&self.dataset[pos]);
        }
        Ok(())
    }

    fn search_range(&self, query: &mut RangeQuery) -> Result<()> {
        for pos in self.shortlist(query.object(), 0) {
            query.check_and_add(&self.dataset[pos]);
        }
        Ok(())
    }

    fn set_query_time_params(&mut self, params: &AnyParams) -> Result<()> {
        for key in BUILD_TIME_KEYS {
            if params.contains(key) {
                return Err(ProximaError::immutable_param(METHOD_NAME, *key));
            }
        }

        let mut reader = ParamReader::new(params);
        let frac = reader.get_f32("dbScanFrac", self.db_scan_frac)?;
        reader.check_unclaimed(METHOD_NAME)?;
        check_scan_frac(frac)?;

        self.db_scan_frac = frac;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::recall_at_k;
    use crate::distance::DistanceMetric;
    use crate::index::seq_search::SeqSearchIndex;
    use crate::space::VectorSpace;

    fn l2() -> Arc<dyn Space> {
        Arc::new(VectorSpace::new(DistanceMetric::Euclidean))
    }

    #[test]
    fn test_permutation_ranks() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let pivots = vec![
            DataObject::new(0, vec![0.0]),
            DataObject::new(1, vec![10.0]),
            DataObject::new(2, vec![5.0]),
        ];
        let object = DataObject::new(9, vec![1.0]);
        // Distances: pivot0 = 1, pivot1 = 9, pivot2 = 4 -> ranks 0, 2, 1
        assert_eq!(permutation(&space, &pivots, &object), vec![0, 2, 1]);
    }

    #[test]
    fn test_spearman_rho() {
        assert_eq!(spearman_rho(&[0, 1, 2], &[0, 1, 2]), 0);
        assert_eq!(spearman_rho(&[0, 1, 2], &[2, 1, 0]), 8);
    }

    #[test]
    fn test_full_scan_is_exact() {
        let dataset = Arc::new(Dataset::random(200, 4));
        let params = AnyParams::parse(&["numPivot=8", "dbScanFrac=1.0"]).unwrap();
        let perm = PermIndex::new(false, l2(), dataset.clone(), &params).unwrap();
        let scan = SeqSearchIndex::new(false, l2(), dataset, &AnyParams::empty()).unwrap();

        let target = DataObject::random(10_000, 4);

        let mut perm_q = RangeQuery::new(l2(), target.clone(), 0.7).unwrap();
        perm.search_range(&mut perm_q).unwrap();
        let mut scan_q = RangeQuery::new(l2(), target, 0.7).unwrap();
        scan.search_range(&mut scan_q).unwrap();

        let perm_ids: Vec<u32> = perm_q.result().objects().iter().map(|o| o.id).collect();
        let scan_ids: Vec<u32> = scan_q.result().objects().iter().map(|o| o.id).collect();
        assert_eq!(perm_ids, scan_ids);
    }

    #[test]
    fn test_recall_improves_with_scan_frac() {
        let dataset = Arc::new(Dataset::random(500, 8));
        let scan = SeqSearchIndex::new(false, l2(), dataset.clone(), &AnyParams::empty()).unwrap();
        let params = AnyParams::parse(&["numPivot=16", "dbScanFrac=0.1"]).unwrap();
        let mut perm = PermIndex::new(false, l2(), dataset, &params).unwrap();

        let target = DataObject::random(10_000, 8);
        let mut truth_q = KnnQuery::new(l2(), target.clone(), 10).unwrap();
        scan.search_knn(&mut truth_q).unwrap();
        let truth: Vec<u32> = truth_q.result().sorted().iter().map(|r| r.0).collect();

        let recall_of = |perm: &PermIndex| {
            let mut q = KnnQuery::new(l2(), target.clone(), 10).unwrap();
            perm.search_knn(&mut q).unwrap();
            let found: Vec<u32> = q.result().sorted().iter().map(|r| r.0).collect();
            recall_at_k(&found, &truth, 10)
        };

        let low = recall_of(&perm);
        perm.set_query_time_params(&AnyParams::parse(&["dbScanFrac=1.0"]).unwrap())
            .unwrap();
        let high = recall_of(&perm);

        assert!(high >= low);
        assert_eq!(high, 1.0);
    }

    #[test]
    fn test_knn_result_size_with_small_scan_frac() {
        // A scan fraction covering fewer than k objects must still yield
        // min(k, n) results; the shortlist widens to k for KNN searches.
        let dataset = Arc::new(Dataset::random(100, 4));
        let params = AnyParams::parse(&["numPivot=8", "dbScanFrac=0.05"]).unwrap();
        let perm = PermIndex::new(false, l2(), dataset, &params).unwrap();

        let mut q = KnnQuery::new(l2(), DataObject::random(10_000, 4), 10).unwrap();
        perm.search_knn(&mut q).unwrap();
        assert_eq!(q.result_size(), 10);

        // k beyond the dataset size degenerates to a full scan.
        let mut q = KnnQuery::new(l2(), DataObject::random(10_001, 4), 500).unwrap();
        perm.search_knn(&mut q).unwrap();
        assert_eq!(q.result_size(), 100);
    }

    #[test]
    fn test_num_pivot_validation() {
        let dataset = Arc::new(Dataset::random(10, 4));
        let params = AnyParams::parse(&["numPivot=11"]).unwrap();
        assert!(matches!(
            PermIndex::new(false, l2(), dataset, &params).err().unwrap(),
            ProximaError::InvalidParam(_)
        ));
    }

    #[test]
    fn test_scan_frac_validation() {
        let dataset = Arc::new(Dataset::random(10, 4));
        let params = AnyParams::parse(&["dbScanFrac=0.0"]).unwrap();
        assert!(matches!(
            PermIndex::new(false, l2(), dataset.clone(), &params).err().unwrap(),
            ProximaError::InvalidParam(_)
        ));

        let mut perm =
            PermIndex::new(false, l2(), dataset, &AnyParams::parse(&["numPivot=4"]).unwrap())
                .unwrap();
        let err = perm
            .set_query_time_params(&AnyParams::parse(&["dbScanFrac=1.5"]).unwrap())
            .unwrap_err();
        assert!(matches!(err, ProximaError::InvalidParam(_)));
        // failed reconfiguration leaves the old value in place
        assert!((perm.db_scan_frac - 0.05).abs() < 1e-6);

        let err = perm
            .set_query_time_params(&AnyParams::parse(&["numPivot=8"]).unwrap())
            .unwrap_err();
        assert!(matches!(err, ProximaError::ImmutableParam { .. }));
    }
}
