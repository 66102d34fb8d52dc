//! Chunk files on disk through embedding, indexing and text queries.

use std::sync::Arc;

use ragdex::index::IndexReader;
use ragdex::pipeline::{EmbedOptions, EmbedReport, EmbedStatus, build_index, embed_documents, query_text};
use ragdex::source::DirectoryChunkSource;
use ragdex::store::{BundleStore, FileBundleStore};
use ragdex::vector::{EmbeddingGenerator, VectorEncoder};
use ragdex::SourceFileId;

use crate::common::{HashGenerator, LookupGenerator, TestProject};

fn hash_encoder(batch_size: usize) -> VectorEncoder {
    let generator: Arc<dyn EmbeddingGenerator> = Arc::new(HashGenerator::new(8));
    VectorEncoder::new(generator, batch_size).unwrap()
}

fn id(name: &str) -> SourceFileId {
    SourceFileId::new(name).unwrap()
}

fn status_of<'a>(report: &'a EmbedReport, name: &str) -> &'a EmbedStatus {
    &report
        .files
        .iter()
        .find(|f| f.source_file_id.as_str() == name)
        .unwrap()
        .status
}

#[test]
fn test_text_query_finds_its_own_chunk() {
    let project = TestProject::new();
    project.add_chunk_file("a.txt", &["rust ownership rules", "borrow checker basics"]);
    project.add_chunk_file("b.txt", &["async runtimes compared"]);

    let source = DirectoryChunkSource::new(project.chunks_dir());
    let store = FileBundleStore::new(project.embeddings_dir());
    let encoder = hash_encoder(4);

    let report = embed_documents(&source, &encoder, &store, EmbedOptions::default()).unwrap();
    assert_eq!(report.embedded_files(), 2);
    assert_eq!(report.vector_count(), 3);

    let built = build_index(&store, &project.index_dir(), &encoder.model_name()).unwrap();
    assert_eq!(built.metadata.vector_count, 3);
    assert_eq!(built.metadata.model_name, "HashModel");

    let reader = IndexReader::open(&project.index_dir()).unwrap();
    let hits = query_text(&reader, &encoder, "borrow checker basics", 1).unwrap();
    assert_eq!(hits[0].source_file_id, id("a.txt"));
    assert_eq!(hits[0].ordinal.get(), 2);
    assert_eq!(hits[0].distance, 0.0);
}

#[test]
fn test_batch_size_does_not_change_bundles() {
    let project = TestProject::new();
    let lines: Vec<String> = (0..37).map(|i| format!("chunk number {i}")).collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    project.add_chunk_file("big.txt", &lines);
    let source = DirectoryChunkSource::new(project.chunks_dir());

    let mut bundles = Vec::new();
    for (run, encoder) in [
        hash_encoder(1),
        hash_encoder(2),
        hash_encoder(32),
        hash_encoder(3).with_parallelism(4).unwrap(),
    ]
    .into_iter()
    .enumerate()
    {
        let store = FileBundleStore::new(project.path().join(format!("store-{run}")));
        embed_documents(&source, &encoder, &store, EmbedOptions::default()).unwrap();
        bundles.push(store.get(&id("big.txt")).unwrap().unwrap());
    }

    assert_eq!(bundles[0].len(), 37);
    for bundle in &bundles[1..] {
        assert_eq!(bundle, &bundles[0]);
    }
}

#[test]
fn test_failing_file_keeps_previous_bundle_and_others_proceed() {
    let project = TestProject::new();
    project.add_chunk_file("good.txt", &["known"]);
    project.add_chunk_file("bad.txt", &["known", "unknown"]);

    let store = FileBundleStore::new(project.embeddings_dir());
    store.save("bad.txt", vec![vec![9.0, 9.0]]).unwrap();

    let generator: Arc<dyn EmbeddingGenerator> =
        Arc::new(LookupGenerator::new(&[("known", &[1.0, 0.0])]));
    let encoder = VectorEncoder::new(generator, 1).unwrap();
    let source = DirectoryChunkSource::new(project.chunks_dir());

    let report = embed_documents(&source, &encoder, &store, EmbedOptions::default()).unwrap();

    assert!(matches!(
        status_of(&report, "good.txt"),
        EmbedStatus::Embedded { vectors: 1 }
    ));
    assert!(matches!(status_of(&report, "bad.txt"), EmbedStatus::Failed(_)));
    assert_eq!(report.failed_files(), 1);

    let previous = store.get(&id("bad.txt")).unwrap().unwrap();
    assert_eq!(previous.vectors(), &[vec![9.0, 9.0]]);
}

#[test]
fn test_empty_chunk_file_gets_no_bundle() {
    let project = TestProject::new();
    project.add_chunk_file("a.txt", &["something"]);
    project.add_chunk_file("empty.txt", &["", "   "]);

    let source = DirectoryChunkSource::new(project.chunks_dir());
    let store = FileBundleStore::new(project.embeddings_dir());
    let report = embed_documents(&source, &hash_encoder(8), &store, EmbedOptions::default()).unwrap();

    assert_eq!(report.embedded_files(), 1);
    assert_eq!(store.keys().unwrap(), vec![id("a.txt")]);
}

#[test]
fn test_prune_removes_bundles_of_deleted_files() {
    let project = TestProject::new();
    project.add_chunk_file("a.txt", &["kept"]);
    let store = FileBundleStore::new(project.embeddings_dir());
    store.save("gone.txt", vec![vec![0.5; 8]]).unwrap();

    let source = DirectoryChunkSource::new(project.chunks_dir());
    let report = embed_documents(
        &source,
        &hash_encoder(8),
        &store,
        EmbedOptions { prune: true },
    )
    .unwrap();

    assert_eq!(report.pruned, vec![id("gone.txt")]);
    assert_eq!(store.keys().unwrap(), vec![id("a.txt")]);
}
