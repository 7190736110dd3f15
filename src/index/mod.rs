//! Search index implementations.

pub mod perm_index;
pub mod seq_search;
pub mod small_world;
pub mod traits;
pub mod vptree;

pub use perm_index::PermIndex;
pub use seq_search::SeqSearchIndex;
pub use small_world::SmallWorldIndex;
pub use traits::Index;
pub use vptree::VpTreeIndex;
