//! Store behaviour as seen by the index build.

use std::fs;

use ragdex::index::{IDENTITY_FILE, INDEX_FILE, IndexError, IndexReader};
use ragdex::pipeline::build_index;
use ragdex::store::{BundleStore, FileBundleStore, StoreError};
use ragdex::{PipelineError, SourceFileId};

use crate::common::TestProject;

#[test]
fn test_overwrite_replaces_whole_bundle_in_next_build() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());

    store
        .save("a.txt", vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
        .unwrap();
    store.save("a.txt", vec![vec![2.0, 2.0]]).unwrap();

    let report = build_index(&store, &project.index_dir(), "TestModel").unwrap();
    assert_eq!(report.metadata.vector_count, 1);

    let reader = IndexReader::open(&project.index_dir()).unwrap();
    let identity = reader.identity(0).unwrap();
    assert_eq!(identity.source_file_id.as_str(), "a.txt");
    assert_eq!(identity.ordinal.get(), 1);
    assert!(reader.identity(1).is_none());
}

#[test]
fn test_corrupt_bundle_is_skipped_and_reported() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());
    store.save("a.txt", vec![vec![1.0, 0.0]]).unwrap();
    store.save("b.txt", vec![vec![0.0, 1.0]]).unwrap();

    let corrupt_key = SourceFileId::new("c.txt").unwrap();
    fs::write(store.bundle_path(&corrupt_key), b"EBND garbage").unwrap();

    let report = build_index(&store, &project.index_dir(), "TestModel").unwrap();

    assert_eq!(report.metadata.vector_count, 2);
    assert_eq!(report.metadata.bundle_count, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "c.txt");
    assert!(matches!(report.skipped[0].error, StoreError::Corrupt { .. }));

    let reader = IndexReader::open(&project.index_dir()).unwrap();
    let ids: Vec<String> = reader
        .query(&[0.0, 0.0], 10)
        .unwrap()
        .into_iter()
        .map(|h| h.source_file_id.to_string())
        .collect();
    assert_eq!(ids, vec!["a.txt", "b.txt"]);
}

#[test]
fn test_empty_corpus_writes_no_artifacts() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());

    let result = build_index(&store, &project.index_dir(), "TestModel");

    assert!(matches!(
        result,
        Err(PipelineError::Index(IndexError::EmptyCorpus))
    ));
    assert!(!project.index_dir().join(INDEX_FILE).exists());
    assert!(!project.index_dir().join(IDENTITY_FILE).exists());
}

#[test]
fn test_only_corrupt_bundles_is_an_empty_corpus() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());
    fs::create_dir_all(project.embeddings_dir()).unwrap();
    fs::write(
        store.bundle_path(&SourceFileId::new("x.txt").unwrap()),
        b"nope",
    )
    .unwrap();

    assert!(matches!(
        build_index(&store, &project.index_dir(), "TestModel"),
        Err(PipelineError::Index(IndexError::EmptyCorpus))
    ));
}

#[test]
fn test_dimension_mismatch_aborts_build() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());
    store.save("a.txt", vec![vec![1.0, 0.0]]).unwrap();
    store.save("b.txt", vec![vec![1.0, 0.0, 0.0]]).unwrap();

    let err = build_index(&store, &project.index_dir(), "TestModel").unwrap_err();
    match err {
        PipelineError::Index(IndexError::DimensionMismatch {
            established_by,
            conflicting,
            ..
        }) => {
            assert_eq!(established_by.as_str(), "a.txt");
            assert_eq!(conflicting.as_str(), "b.txt");
        }
        other => panic!("Expected dimension mismatch, got {other:?}"),
    }
    assert!(!project.index_dir().join(INDEX_FILE).exists());
}

#[test]
fn test_stale_bundles_survive_without_prune() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());
    store.save("old.txt", vec![vec![5.0, 5.0]]).unwrap();
    store.save("a.txt", vec![vec![1.0, 0.0]]).unwrap();

    let report = build_index(&store, &project.index_dir(), "TestModel").unwrap();
    assert_eq!(report.metadata.bundle_count, 2);
}

#[test]
fn test_nan_vectors_never_reach_the_index() {
    let project = TestProject::new();
    let store = FileBundleStore::new(project.embeddings_dir());

    assert!(matches!(
        store.save("bad.txt", vec![vec![-f32::NAN, 0.0]]),
        Err(StoreError::NonFiniteValue { .. })
    ));
    store.save("a.txt", vec![vec![1.0, 0.0]]).unwrap();

    let report = build_index(&store, &project.index_dir(), "TestModel").unwrap();
    assert_eq!(report.metadata.vector_count, 1);
    assert!(store.keys().unwrap().iter().all(|k| k.as_str() != "bad.txt"));
}
