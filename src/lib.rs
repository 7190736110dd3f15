//! proxima: pluggable exact and approximate nearest-neighbor search.
//!
//! This crate provides a small framework for similarity search over generic
//! metric and non-metric spaces: a space abstraction for distance
//! computation, reusable KNN and range queries, and a registry of search
//! methods selectable by name with string `key=value` parameters.
//!
//! # Built-in methods
//!
//! - **`seq_search`**: exact parallel sequential scan (ground truth baseline)
//! - **`vptree`**: vantage-point tree, exact at default pruning factors
//! - **`small_world_rand`**: navigable small-world proximity graph (KNN only)
//! - **`perm_incsort`**: pivot-permutation filtering with an exact rescan
//!
//! # Example
//!
//! ```
//! use proxima::{
//!     AnyParams, Dataset, DistanceMetric, Index, KnnQuery, Query, VectorSpace,
//!     standard_registry,
//! };
//! use std::sync::Arc;
//!
//! let space: Arc<dyn proxima::Space> = Arc::new(VectorSpace::new(DistanceMetric::Euclidean));
//! let dataset = Arc::new(Dataset::random(100, 16));
//!
//! let registry = standard_registry();
//! let params = AnyParams::parse(&["bucketSize=10"]).unwrap();
//! let index = registry
//!     .create_method(false, "vptree", space.clone(), dataset.clone(), &params)
//!     .unwrap();
//!
//! let mut query = KnnQuery::new(space, dataset[0].clone(), 5).unwrap();
//! index.search(Query::Knn(&mut query)).unwrap();
//! assert_eq!(query.result_size(), 5);
//! ```

pub mod dataset;
pub mod distance;
pub mod error;
pub mod index;
pub mod init;
pub mod params;
pub mod query;
pub mod registry;
pub mod space;

// Re-export commonly used types at crate root
pub use dataset::{recall_at_k, DataObject, Dataset};
pub use distance::DistanceMetric;
pub use error::{ProximaError, Result};
pub use index::{Index, PermIndex, SeqSearchIndex, SmallWorldIndex, VpTreeIndex};
pub use init::init_library;
pub use params::AnyParams;
pub use query::{KnnQuery, KnnResult, Query, RangeQuery, RangeResult};
pub use registry::{standard_registry, IndexConstructor, MethodRegistry};
pub use space::{Space, VectorSpace};
