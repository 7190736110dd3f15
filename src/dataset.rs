//! Data objects and the ordered collections that own them.
//!
//! A [`Dataset`] is the sole owner of its objects (arena style). Indices and
//! queries hold [`DataObject`] clones, which share the underlying payload
//! through an `Arc` and never copy vector data.

use crate::error::{ProximaError, Result};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// An immutable data record: an identifier plus an opaque float payload.
///
/// Cloning is cheap; the payload is reference-counted.
#[derive(Clone, Debug)]
pub struct DataObject {
    /// Identifier reported in search results.
    pub id: u32,
    /// The payload vector.
    pub data: Arc<[f32]>,
}

impl DataObject {
    /// Create a new object with the given ID and payload.
    pub fn new(id: u32, data: Vec<f32>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Create a random object with values uniformly distributed in [-1.0, 1.0].
    pub fn random(id: u32, dim: usize) -> Self {
        let mut rng = rand::thread_rng();
        let data: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self::new(id, data)
    }

    /// Return the dimensionality of this object's payload.
    pub fn dim(&self) -> usize {
        self.data.len()
    }
}

/// An ordered, position-addressable collection of objects.
///
/// Mutable only while being assembled; once handed to index construction
/// (behind an `Arc`) it is never modified again.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    objects: Vec<DataObject>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate `n` random objects of the given dimensionality, with ids
    /// assigned by position.
    pub fn random(n: usize, dim: usize) -> Self {
        let objects = (0..n).map(|i| DataObject::random(i as u32, dim)).collect();
        Self { objects }
    }

    /// Append an object during assembly.
    pub fn push(&mut self, object: DataObject) {
        self.objects.push(object);
    }

    /// Remove and return the object at `pos` during assembly.
    ///
    /// Later objects shift down, preserving order.
    pub fn remove(&mut self, pos: usize) -> DataObject {
        self.objects.remove(pos)
    }

    /// Return the object at `pos`, if any.
    pub fn get(&self, pos: usize) -> Option<&DataObject> {
        self.objects.get(pos)
    }

    /// Return the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Return true if the dataset holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate over objects in position order.
    pub fn iter(&self) -> std::slice::Iter<'_, DataObject> {
        self.objects.iter()
    }

    /// The objects as a slice, in position order.
    pub fn as_slice(&self) -> &[DataObject] {
        &self.objects
    }

    /// Fail with `InsufficientData` unless at least `required` objects are
    /// present. Index constructors call this before building anything.
    pub fn require_min_objects(&self, required: usize) -> Result<()> {
        if self.objects.len() < required {
            return Err(ProximaError::insufficient_data(required, self.objects.len()));
        }
        Ok(())
    }
}

impl std::ops::Index<usize> for Dataset {
    type Output = DataObject;

    fn index(&self, pos: usize) -> &DataObject {
        &self.objects[pos]
    }
}

impl FromIterator<DataObject> for Dataset {
    fn from_iter<T: IntoIterator<Item = DataObject>>(iter: T) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a DataObject;
    type IntoIter = std::slice::Iter<'a, DataObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// Compute recall@k between predicted and ground truth result ids.
///
/// Recall is the fraction of true nearest neighbors that were found.
/// Returns a value between 0.0 and 1.0.
pub fn recall_at_k(predicted: &[u32], ground_truth: &[u32], k: usize) -> f32 {
    let pred_set: HashSet<u32> = predicted.iter().take(k).copied().collect();
    let truth_set: HashSet<u32> = ground_truth.iter().take(k).copied().collect();

    let intersection = pred_set.intersection(&truth_set).count();
    intersection as f32 / k as f32
}
