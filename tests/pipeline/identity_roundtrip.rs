//! Identity bookkeeping across build, persist and reload.

use std::fs;

use ragdex::index::{IDENTITY_FILE, IndexBuilder, IndexError, IndexReader};
use ragdex::store::EmbeddingBundle;
use ragdex::SourceFileId;

use crate::common::TestProject;

fn corpus() -> Vec<(SourceFileId, EmbeddingBundle)> {
    let files: [(&str, Vec<Vec<f32>>); 3] = [
        ("alpha.txt", vec![vec![0.0, 0.0, 1.0], vec![0.0, 2.0, 0.0]]),
        ("beta.txt", vec![vec![3.0, 0.0, 0.0]]),
        (
            "gamma.txt",
            vec![vec![4.0, 4.0, 0.0], vec![0.0, 5.0, 5.0], vec![6.0, 0.0, 6.0]],
        ),
    ];
    files
        .into_iter()
        .map(|(id, vectors)| {
            (
                SourceFileId::new(id).unwrap(),
                EmbeddingBundle::new(vectors).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_every_stored_vector_finds_its_own_identity() {
    let project = TestProject::new();
    IndexBuilder::from_bundles(corpus())
        .unwrap()
        .write_to(&project.index_dir(), "TestModel")
        .unwrap();
    let reader = IndexReader::open(&project.index_dir()).unwrap();

    for (source_file_id, bundle) in corpus() {
        for (offset, vector) in bundle.vectors().iter().enumerate() {
            let hits = reader.query(vector, 1).unwrap();
            assert_eq!(hits[0].source_file_id, source_file_id);
            assert_eq!(hits[0].ordinal.get() as usize, offset + 1);
            assert_eq!(hits[0].distance, 0.0);
        }
    }
}

#[test]
fn test_rebuild_in_other_order_gives_same_identities() {
    let forward = IndexBuilder::from_bundles(corpus()).unwrap().into_reader();
    let mut reversed_corpus = corpus();
    reversed_corpus.reverse();
    let reversed = IndexBuilder::from_bundles(reversed_corpus)
        .unwrap()
        .into_reader();

    // Positions differ, identities of each vector do not
    assert_ne!(forward.identity(0), reversed.identity(0));
    for (_, bundle) in corpus() {
        for vector in bundle.vectors() {
            let a = &forward.query(vector, 1).unwrap()[0];
            let b = &reversed.query(vector, 1).unwrap()[0];
            assert_eq!(a, b);
        }
    }
}

#[test]
fn test_positions_map_to_identities_in_insertion_order() {
    let reader = IndexBuilder::from_bundles(corpus()).unwrap().into_reader();

    let described: Vec<(String, u32)> = (0..reader.len())
        .map(|i| {
            let identity = reader.identity(i).unwrap();
            (identity.source_file_id.to_string(), identity.ordinal.get())
        })
        .collect();
    assert_eq!(
        described,
        vec![
            ("alpha.txt".to_string(), 1),
            ("alpha.txt".to_string(), 2),
            ("beta.txt".to_string(), 1),
            ("gamma.txt".to_string(), 1),
            ("gamma.txt".to_string(), 2),
            ("gamma.txt".to_string(), 3),
        ]
    );
}

#[test]
fn test_index_without_identity_table_is_rejected() {
    let project = TestProject::new();
    IndexBuilder::from_bundles(corpus())
        .unwrap()
        .write_to(&project.index_dir(), "TestModel")
        .unwrap();
    fs::remove_file(project.index_dir().join(IDENTITY_FILE)).unwrap();

    assert!(matches!(
        IndexReader::open(&project.index_dir()),
        Err(IndexError::MissingArtifact { .. })
    ));
}

#[test]
fn test_identity_table_from_other_build_is_rejected() {
    let first = TestProject::new();
    let second = TestProject::new();
    for project in [&first, &second] {
        IndexBuilder::from_bundles(corpus())
            .unwrap()
            .write_to(&project.index_dir(), "TestModel")
            .unwrap();
    }

    fs::copy(
        second.index_dir().join(IDENTITY_FILE),
        first.index_dir().join(IDENTITY_FILE),
    )
    .unwrap();

    assert!(matches!(
        IndexReader::open(&first.index_dir()),
        Err(IndexError::BuildMismatch { .. })
    ));
}
