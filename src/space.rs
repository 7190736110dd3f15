//! Spaces: distance functions plus dataset materialization.
//!
//! A [`Space`] encapsulates how distances between objects are computed. The
//! framework never assumes the distance is symmetric or satisfies the
//! triangle inequality; individual indices document any stronger
//! requirements (the VP-tree needs a true metric for exact results).

use crate::dataset::{DataObject, Dataset};
use crate::distance::DistanceMetric;
use crate::error::{ProximaError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A distance function over pairs of objects.
///
/// Implementations must be deterministic and pure: the same pair of objects
/// always yields the same non-negative-or-documented value, with no side
/// effects. `distance(a, b)` is read as "distance from data object `a` to
/// query object `b`"; asymmetric spaces must honor that orientation.
pub trait Space: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Compute the distance from `a` to `b`.
    fn distance(&self, a: &DataObject, b: &DataObject) -> f32;
}

/// The stock space over dense float vectors, parameterized by a
/// [`DistanceMetric`].
#[derive(Debug, Clone, Copy)]
pub struct VectorSpace {
    metric: DistanceMetric,
}

impl VectorSpace {
    /// Create a vector space using the given metric.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    /// The metric this space computes.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Build a dataset from already-materialized rows.
    ///
    /// Ids are assigned by position. Fails with `InsufficientData` when fewer
    /// than 2 usable rows are supplied, and with `Parse` on an empty row or a
    /// row whose dimensionality differs from the first.
    pub fn create_dataset(&self, rows: &[Vec<f32>]) -> Result<Dataset> {
        let mut dataset = Dataset::new();
        let mut dim = None;

        for (i, row) in rows.iter().enumerate() {
            validate_row(i + 1, row.len(), &mut dim)?;
            dataset.push(DataObject::new(i as u32, row.clone()));
        }

        dataset.require_min_objects(2)?;
        Ok(dataset)
    }

    /// Read a dataset from a text file, one whitespace-separated float row
    /// per line. `max_count = 0` means unbounded; otherwise at most
    /// `max_count` records are read.
    ///
    /// Fails with `Parse` naming the offending 1-based line on malformed
    /// input, and with `InsufficientData` when fewer than 2 usable records
    /// were read.
    pub fn read_dataset(&self, path: impl AsRef<Path>, max_count: usize) -> Result<Dataset> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut dataset = Dataset::new();
        let mut dim = None;

        for (line_no, line) in reader.lines().enumerate() {
            if max_count != 0 && dataset.len() >= max_count {
                break;
            }

            let line = line?;
            let record = line_no + 1;
            if line.trim().is_empty() {
                continue;
            }

            let mut row = Vec::new();
            for token in line.split_whitespace() {
                let value: f32 = token.parse().map_err(|_| {
                    ProximaError::parse(record, format!("bad float '{token}'"))
                })?;
                row.push(value);
            }

            validate_row(record, row.len(), &mut dim)?;
            dataset.push(DataObject::new(dataset.len() as u32, row));
        }

        dataset.require_min_objects(2)?;
        Ok(dataset)
    }
}

impl Space for VectorSpace {
    fn name(&self) -> &str {
        match self.metric {
            DistanceMetric::Euclidean => "l2",
            DistanceMetric::EuclideanSquared => "l2sqr",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "negdot",
            DistanceMetric::Manhattan => "l1",
        }
    }

    fn distance(&self, a: &DataObject, b: &DataObject) -> f32 {
        self.metric.compute(&a.data, &b.data)
    }
}

fn validate_row(record: usize, len: usize, dim: &mut Option<usize>) -> Result<()> {
    if len == 0 {
        return Err(ProximaError::parse(record, "empty record"));
    }
    match dim {
        None => *dim = Some(len),
        Some(expected) if *expected != len => {
            return Err(ProximaError::parse(
                record,
                format!("dimension {len} does not match expected {expected}"),
            ));
        }
        Some(_) => {}
    }
    Ok(())
}
