//! The common interface every search index implements.
//!
//! One trait covers algorithms with fundamentally different build
//! procedures and accuracy guarantees; dispatch over the two query variants
//! happens at runtime through [`Query`].

use crate::error::Result;
use crate::params::AnyParams;
use crate::query::{KnnQuery, Query, RangeQuery};

/// A built search structure over a dataset and a space.
///
/// # Lifecycle
///
/// Build-then-query: the structure is created fully built by its
/// constructor and never restructured afterwards. Only query-time behavior
/// may change, through [`set_query_time_params`](Self::set_query_time_params).
///
/// # Thread safety
///
/// A built index supports concurrent read-only search from multiple
/// threads. Reconfiguration takes `&mut self`, so the borrow checker
/// serializes it against in-flight searches: holders of a shared
/// `Arc<dyn Index>` can search but cannot reconfigure.
pub trait Index: Send + Sync {
    /// The registered method name of this index.
    fn name(&self) -> &str;

    /// Dispatch a query to the matching algorithm.
    ///
    /// An index that does not support the query's variant fails with
    /// `UnsupportedQueryType` before touching the query's accumulator.
    fn search(&self, query: Query<'_>) -> Result<()> {
        match query {
            Query::Knn(q) => self.search_knn(q),
            Query::Range(q) => self.search_range(q),
        }
    }

    /// Answer a k-nearest-neighbor query, populating its accumulator.
    fn search_knn(&self, query: &mut KnnQuery) -> Result<()>;

    /// Answer a fixed-radius query, populating its accumulator.
    ///
    /// The default fails with `UnsupportedQueryType`; indices supporting
    /// range queries override this.
    fn search_range(&self, _query: &mut RangeQuery) -> Result<()> {
        Err(crate::ProximaError::unsupported_query(self.name(), "range"))
    }

    /// Update query-time parameters without rebuilding.
    ///
    /// Only keys the index recognizes as query-time-mutable are accepted:
    /// build-time keys fail with `ImmutableParam`, unknown keys with
    /// `UnsupportedParam`. On any error no parameter is changed.
    fn set_query_time_params(&mut self, params: &AnyParams) -> Result<()>;
}
