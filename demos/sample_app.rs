//! End-to-end tour of the search framework.
//!
//! Builds three indices over the same dataset, runs range and KNN queries
//! against each, and re-tunes the permutation index at query time.
//!
//! Run with: cargo run --example sample_app [dataset.txt]

use proxima::{
    init_library, standard_registry, AnyParams, DataObject, Dataset, DistanceMetric, Index,
    KnnQuery, Query, RangeQuery, Result, Space, VectorSpace,
};
use std::sync::Arc;
use tracing::info;

const K: usize = 5;
const RADIUS: f32 = 0.6;

fn report_knn(label: &str, query: &KnnQuery) {
    info!(index = label, found = query.result_size(), "knn results");
    for (id, distance) in query.result().sorted() {
        println!("  [{label}] knn id={id} distance={distance:.4}");
    }
}

fn report_range(label: &str, query: &RangeQuery) {
    info!(index = label, found = query.result_size(), "range results");
    for i in 0..query.result_size() {
        if let Some((object, distance)) = query.result().get(i) {
            println!("  [{label}] range id={} distance={distance:.4}", object.id);
        }
    }
}

fn run_queries(label: &str, index: &dyn Index, space: Arc<dyn Space>, target: &DataObject) {
    let mut knn = KnnQuery::new(space.clone(), target.clone(), K).unwrap();
    match index.search(Query::Knn(&mut knn)) {
        Ok(()) => report_knn(label, &knn),
        Err(err) => println!("  [{label}] knn failed: {err}"),
    }

    // Same query object again after a reset, to show reuse.
    knn.reset();
    index.search(Query::Knn(&mut knn)).ok();
    assert_eq!(knn.result_size(), knn.result().sorted().len());

    let mut range = RangeQuery::new(space, target.clone(), RADIUS).unwrap();
    match index.search(Query::Range(&mut range)) {
        Ok(()) => report_range(label, &range),
        Err(err) => println!("  [{label}] range failed: {err}"),
    }
}

fn main() -> Result<()> {
    init_library(None)?;

    let space_impl = VectorSpace::new(DistanceMetric::Euclidean);
    let space: Arc<dyn Space> = Arc::new(space_impl);

    let dataset = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "reading dataset");
            Arc::new(space_impl.read_dataset(&path, 0)?)
        }
        None => {
            info!("no dataset file given, generating random data");
            Arc::new(Dataset::random(1_000, 16))
        }
    };
    let dim = dataset[0].data.len();
    info!(objects = dataset.len(), dim, "dataset ready");

    let registry = standard_registry();
    let tree = registry.create_method(
        true,
        "vptree",
        space.clone(),
        dataset.clone(),
        &AnyParams::parse(&["bucketSize=16", "alphaLeft=1.0", "alphaRight=1.0"])?,
    )?;
    let graph = registry.create_method(
        true,
        "small_world_rand",
        space.clone(),
        dataset.clone(),
        &AnyParams::parse(&["NN=10", "initIndexAttempts=3", "indexThreadQty=4"])?,
    )?;
    let mut perm = registry.create_method(
        true,
        "perm_incsort",
        space.clone(),
        dataset.clone(),
        &AnyParams::parse(&["numPivot=16", "dbScanFrac=0.05"])?,
    )?;

    let target = DataObject::random(u32::MAX, dim);

    run_queries("vptree", tree.as_ref(), space.clone(), &target);
    run_queries("small_world_rand", graph.as_ref(), space.clone(), &target);
    run_queries("perm_incsort", perm.as_ref(), space.clone(), &target);

    // Re-tune the permutation index without rebuilding: widen the scan until
    // results are exact.
    perm.set_query_time_params(&AnyParams::parse(&["dbScanFrac=1.0"])?)?;
    info!("perm_incsort re-tuned to a full scan");
    run_queries("perm_incsort(full)", perm.as_ref(), space, &target);

    Ok(())
}
