//! Two files, `a.txt` with [1,0] and [0,1], `b.txt` with [1,1], end to end through disk.

use ragdex::index::{IndexBuilder, IndexError, IndexReader};
use ragdex::store::{BundleStore, FileBundleStore};

use crate::common::TestProject;

fn build_example(project: &TestProject) -> IndexReader {
    let store = FileBundleStore::new(project.embeddings_dir());
    store
        .save("a.txt", vec![vec![1.0, 0.0], vec![0.0, 1.0]])
        .unwrap();
    store.save("b.txt", vec![vec![1.0, 1.0]]).unwrap();

    let loaded = store.load_all().unwrap();
    IndexBuilder::from_bundles(loaded.bundles)
        .unwrap()
        .write_to(&project.index_dir(), "TestModel")
        .unwrap();

    IndexReader::open(&project.index_dir()).unwrap()
}

fn describe(reader: &IndexReader, query: &[f32], k: usize) -> Vec<(String, u32, f32)> {
    reader
        .query(query, k)
        .unwrap()
        .into_iter()
        .map(|h| (h.source_file_id.to_string(), h.ordinal.get(), h.distance))
        .collect()
}

#[test]
fn test_worked_example_query() {
    let project = TestProject::new();
    let reader = build_example(&project);

    assert_eq!(reader.len(), 3);
    assert_eq!(
        describe(&reader, &[1.0, 0.0], 2),
        vec![("a.txt".to_string(), 1, 0.0), ("b.txt".to_string(), 1, 1.0)]
    );
}

#[test]
fn test_k_larger_than_corpus_returns_everything() {
    let project = TestProject::new();
    let reader = build_example(&project);

    assert_eq!(
        describe(&reader, &[1.0, 0.0], 10),
        vec![
            ("a.txt".to_string(), 1, 0.0),
            ("b.txt".to_string(), 1, 1.0),
            ("a.txt".to_string(), 2, 2.0),
        ]
    );
}

#[test]
fn test_k_zero_returns_nothing() {
    let project = TestProject::new();
    let reader = build_example(&project);
    assert!(reader.query(&[1.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn test_query_of_wrong_dimension_fails() {
    let project = TestProject::new();
    let reader = build_example(&project);
    assert!(matches!(
        reader.query(&[1.0, 0.0, 0.0], 1),
        Err(IndexError::WrongDimension {
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn test_equidistant_hits_follow_insertion_order() {
    let project = TestProject::new();
    let reader = build_example(&project);

    // [0.5, 0.5] is 0.5 away from every vector
    let hits = describe(&reader, &[0.5, 0.5], 3);
    assert_eq!(
        hits,
        vec![
            ("a.txt".to_string(), 1, 0.5),
            ("a.txt".to_string(), 2, 0.5),
            ("b.txt".to_string(), 1, 0.5),
        ]
    );
}

#[test]
fn test_nan_query_is_rejected_instead_of_ranked_first() {
    let project = TestProject::new();
    let reader = build_example(&project);

    assert!(matches!(
        reader.query(&[-f32::NAN, 0.0], 3),
        Err(IndexError::NonFiniteVector { component: 0 })
    ));

    let hits = describe(&reader, &[1.0, 0.0], 1);
    assert_eq!(hits, vec![("a.txt".to_string(), 1, 0.0)]);
}
