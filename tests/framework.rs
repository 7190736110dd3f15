//! Framework-level tests: initialization, the method registry, parameter
//! handling, and query reuse across every built-in method.

use proxima::{
    init_library, standard_registry, AnyParams, DataObject, Dataset, DistanceMetric, Index,
    KnnQuery, ProximaError, Query, RangeQuery, Space, VectorSpace,
};
use std::io::Write;
use std::sync::Arc;

fn l2() -> Arc<dyn Space> {
    Arc::new(VectorSpace::new(DistanceMetric::Euclidean))
}

fn build(method: &str, dataset: &Arc<Dataset>, params: &[&str]) -> Box<dyn Index> {
    standard_registry()
        .create_method(
            false,
            method,
            l2(),
            dataset.clone(),
            &AnyParams::parse(params).unwrap(),
        )
        .unwrap()
}

#[test]
fn test_init_library_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("search.log");

    let first = init_library(Some(&log_path)).unwrap();
    let second = init_library(Some(&log_path)).unwrap();
    let third = init_library(None).unwrap();

    // Only the first call can install the subscriber.
    assert!(!second);
    assert!(!third);
    let _ = first;
}

#[test]
fn test_registry_error_taxonomy() {
    let registry = standard_registry();
    let dataset = Arc::new(Dataset::random(20, 4));

    let err = registry
        .create_method(false, "no_such_method", l2(), dataset.clone(), &AnyParams::empty())
        .err().unwrap();
    assert!(matches!(err, ProximaError::UnknownMethod(_)));

    let mut custom = proxima::MethodRegistry::new();
    custom
        .register("mine", proxima::index::seq_search::create)
        .unwrap();
    let err = custom
        .register("mine", proxima::index::seq_search::create)
        .unwrap_err();
    assert!(matches!(err, ProximaError::DuplicateMethod(_)));

    // Registered custom constructors work through create_method.
    let index = custom
        .create_method(false, "mine", l2(), dataset, &AnyParams::empty())
        .unwrap();
    assert_eq!(index.name(), "seq_search");
}

#[test]
fn test_param_error_taxonomy() {
    // Token without '='
    let err = AnyParams::parse(&["bucketSize"]).unwrap_err();
    assert!(matches!(err, ProximaError::MalformedParam(_)));

    // Duplicate key
    let err = AnyParams::parse(&["NN=5", "NN=7"]).unwrap_err();
    assert!(matches!(err, ProximaError::MalformedParam(_)));

    let dataset = Arc::new(Dataset::random(20, 4));
    let registry = standard_registry();

    // Unparsable value
    let err = registry
        .create_method(
            false,
            "vptree",
            l2(),
            dataset.clone(),
            &AnyParams::parse(&["bucketSize=many"]).unwrap(),
        )
        .err().unwrap();
    assert!(matches!(err, ProximaError::TypeMismatch { .. }));

    // Key unknown to the method
    let err = registry
        .create_method(
            false,
            "vptree",
            l2(),
            dataset.clone(),
            &AnyParams::parse(&["efConstruction=100"]).unwrap(),
        )
        .err().unwrap();
    assert!(matches!(err, ProximaError::UnsupportedParam { .. }));

    // Build-time key resupplied at query time
    let mut tree = build("vptree", &dataset, &[]);
    let err = tree
        .set_query_time_params(&AnyParams::parse(&["bucketSize=4"]).unwrap())
        .unwrap_err();
    assert!(matches!(err, ProximaError::ImmutableParam { .. }));
}

#[test]
fn test_insufficient_data_on_every_method() {
    let dataset = Arc::new(Dataset::random(1, 4));
    let registry = standard_registry();
    for method in ["seq_search", "vptree", "small_world_rand", "perm_incsort"] {
        let err = registry
            .create_method(false, method, l2(), dataset.clone(), &AnyParams::empty())
            .err().unwrap();
        assert!(
            matches!(err, ProximaError::InsufficientData { .. }),
            "{method} accepted a single-object dataset"
        );
    }
}

#[test]
fn test_small_world_rejects_range_queries() {
    let dataset = Arc::new(Dataset::random(30, 4));
    let graph = build("small_world_rand", &dataset, &["NN=5"]);

    let mut query = RangeQuery::new(l2(), DataObject::random(99, 4), 1.0).unwrap();
    let err = graph.search(Query::Range(&mut query)).unwrap_err();
    assert!(matches!(err, ProximaError::UnsupportedQueryType { .. }));
    // The failed search leaves the accumulator untouched.
    assert_eq!(query.result_size(), 0);
}

#[test]
fn test_query_reset_reissue_identical() {
    let dataset = Arc::new(Dataset::random(120, 4));
    let methods: Vec<(&str, Vec<&str>)> = vec![
        ("seq_search", vec![]),
        ("vptree", vec![]),
        ("small_world_rand", vec!["NN=8"]),
        ("perm_incsort", vec!["numPivot=8"]),
    ];

    for (method, params) in methods {
        let index = build(method, &dataset, &params);
        let mut query = KnnQuery::new(l2(), DataObject::random(7_000, 4), 5).unwrap();

        index.search(Query::Knn(&mut query)).unwrap();
        let first = query.result().sorted();

        query.reset();
        assert_eq!(query.result_size(), 0);
        index.search(Query::Knn(&mut query)).unwrap();
        let second = query.result().sorted();

        assert_eq!(first, second, "{method} is not reset-idempotent");
    }
}

#[test]
fn test_query_reusable_across_indices() {
    let dataset = Arc::new(Dataset::random(80, 4));
    let scan = build("seq_search", &dataset, &[]);
    let tree = build("vptree", &dataset, &[]);

    let mut query = KnnQuery::new(l2(), DataObject::random(8_000, 4), 5).unwrap();
    scan.search(Query::Knn(&mut query)).unwrap();
    let from_scan = query.result().sorted();

    query.reset();
    tree.search(Query::Knn(&mut query)).unwrap();
    let from_tree = query.result().sorted();

    assert_eq!(from_scan, from_tree);
}

#[test]
fn test_perm_scan_frac_recall_monotone() {
    let dataset = Arc::new(Dataset::random(400, 8));
    let scan = build("seq_search", &dataset, &[]);
    let mut perm = build("perm_incsort", &dataset, &["numPivot=16", "dbScanFrac=0.1"]);

    let target = DataObject::random(9_000, 8);
    let mut truth_q = KnnQuery::new(l2(), target.clone(), 10).unwrap();
    scan.search(Query::Knn(&mut truth_q)).unwrap();
    let truth: Vec<u32> = truth_q.result().sorted().iter().map(|r| r.0).collect();

    let recall = |index: &dyn Index| {
        let mut q = KnnQuery::new(l2(), target.clone(), 10).unwrap();
        index.search(Query::Knn(&mut q)).unwrap();
        let found: Vec<u32> = q.result().sorted().iter().map(|r| r.0).collect();
        proxima::recall_at_k(&found, &truth, 10)
    };

    let low = recall(perm.as_ref());
    perm.set_query_time_params(&AnyParams::parse(&["dbScanFrac=1.0"]).unwrap())
        .unwrap();
    let high = recall(perm.as_ref());

    assert!(high >= low, "widened scan lowered recall: {low} -> {high}");
    assert_eq!(high, 1.0, "full scan must be exact");
}

#[test]
fn test_end_to_end_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..50 {
        writeln!(file, "{}.0 {}.5", i, i % 7).unwrap();
    }
    file.flush().unwrap();

    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let dataset = Arc::new(space.read_dataset(file.path(), 0).unwrap());
    assert_eq!(dataset.len(), 50);

    let tree = build("vptree", &dataset, &["bucketSize=4"]);
    let mut query = KnnQuery::new(l2(), dataset[10].clone(), 1).unwrap();
    tree.search(Query::Knn(&mut query)).unwrap();
    // Nearest neighbor of an indexed object is itself.
    assert_eq!(query.result().sorted()[0].0, dataset[10].id);
}
