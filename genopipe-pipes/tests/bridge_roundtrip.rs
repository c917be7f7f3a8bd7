use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use genopipe_blob::MemoryBlobStore;
use genopipe_pipes::{BridgeConfig, BridgeOutcome, BridgeSupervisor, PipeError};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn supervisor(store: &MemoryBlobStore, scratch: &Path) -> BridgeSupervisor {
    BridgeSupervisor::new(
        Arc::new(store.clone()),
        BridgeConfig::new()
            .with_scratch_dir(scratch)
            .with_chunk_size(8 * 1024),
    )
    .expect("supervisor")
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Write to a FIFO the way an external tool would: blocking std I/O.
async fn feed_pipe(path: std::path::PathBuf, data: Vec<u8>) {
    tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.write_all(&data).unwrap();
    })
    .await
    .unwrap();
}

/// Read a FIFO to EOF the way an external tool would.
async fn drain_pipe(path: std::path::PathBuf) -> Vec<u8> {
    tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut file = std::fs::File::open(path).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn writer_then_reader_round_trips_exact_bytes() {
    let store = MemoryBlobStore::new().with_chunk_size(8 * 1024);
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    // Cover empty, sub-chunk, and multi-chunk payloads.
    for (key, len) in [("empty.bin", 0), ("small.bin", 100), ("big.bin", 300 * 1024)] {
        let data = payload(len);

        let pipe = sup.open_writer("b1", key).unwrap();
        feed_pipe(pipe.clone(), data.clone()).await;
        let outcome = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
            .await
            .expect("writer close timed out")
            .unwrap();
        assert!(outcome.is_completed(), "writer outcome for {key}: {outcome:?}");
        assert_eq!(outcome.bytes(), len as u64);
        assert_eq!(store.get("b1", key).unwrap(), Bytes::from(data.clone()));

        let pipe = sup.open_reader("b1", key).unwrap();
        let read_back = drain_pipe(pipe.clone()).await;
        assert_eq!(read_back, data, "byte-exact round trip for {key}");
        let outcome = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
            .await
            .expect("reader close timed out")
            .unwrap();
        assert!(outcome.is_completed());
    }

    sup.close_all().await;
    assert!(!sup.scratch_dir().exists(), "scratch directory leaked");
}

#[tokio::test]
async fn reader_with_no_consumer_closes_in_bounded_time() {
    let store = MemoryBlobStore::new();
    store.insert("b1", "chr1.vcf", Bytes::from_static(b"##fileformat=VCFv4.2\n"));
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let pipe = sup.open_reader("b1", "chr1.vcf").unwrap();
    assert!(pipe.exists());

    // Nothing ever opens the pipe; close must still return promptly and
    // remove the endpoint.
    let outcome = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
        .await
        .expect("close hung with no consumer attached")
        .unwrap();
    assert!(matches!(outcome, BridgeOutcome::Cancelled { bytes: 0 }));
    assert!(!pipe.exists(), "endpoint left on disk");
}

#[tokio::test]
async fn writer_with_no_producer_closes_in_bounded_time() {
    let store = MemoryBlobStore::new();
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let pipe = sup.open_writer("b1", "out.bin").unwrap();
    let outcome = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
        .await
        .expect("close hung with no producer attached")
        .unwrap();
    assert!(matches!(outcome, BridgeOutcome::Cancelled { .. }));
    assert!(!pipe.exists());
    assert!(!store.contains("b1", "out.bin"), "aborted write was published");
}

#[tokio::test]
async fn reader_for_missing_object_reports_not_found() {
    let store = MemoryBlobStore::new();
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let pipe = sup.open_reader("b1", "missing.vcf").unwrap();
    let result = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
        .await
        .expect("close timed out");
    match result {
        Err(PipeError::Blob { source }) => {
            assert!(matches!(source, genopipe_blob::BlobError::NotFound { .. }))
        }
        other => panic!("expected blob not-found, got {other:?}"),
    }
    assert!(!pipe.exists());
}

#[tokio::test]
async fn cancelled_writer_publishes_nothing() {
    let store = MemoryBlobStore::new();
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let pipe = sup.open_writer("b1", "partial.bin").unwrap();

    // Attach a producer that writes some bytes but never closes its end,
    // so the bridge is mid-transfer when we tear it down.
    let mut producer = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&pipe)
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut producer, &payload(1024))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let outcome = tokio::time::timeout(TEST_TIMEOUT, sup.close(&pipe))
        .await
        .expect("close timed out mid-transfer")
        .unwrap();
    assert!(matches!(outcome, BridgeOutcome::Cancelled { .. }));
    assert!(!store.contains("b1", "partial.bin"), "partial object was published");

    drop(producer);
}

#[tokio::test]
async fn closing_an_unknown_endpoint_is_an_error() {
    let store = MemoryBlobStore::new();
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let result = sup.close(Path::new("/tmp/not-a-real-endpoint")).await;
    assert!(matches!(result, Err(PipeError::UnknownEndpoint { .. })));
}

#[tokio::test]
async fn close_all_tears_down_every_bridge() {
    let store = MemoryBlobStore::new();
    store.insert("b1", "a.vcf", Bytes::from_static(b"aaaa"));
    store.insert("b1", "b.vcf", Bytes::from_static(b"bbbb"));
    let scratch = tempfile::tempdir().unwrap();
    let sup = supervisor(&store, scratch.path());

    let pipes = vec![
        sup.open_reader("b1", "a.vcf").unwrap(),
        sup.open_reader("b1", "b.vcf").unwrap(),
        sup.open_writer("b2", "out.bin").unwrap(),
    ];

    let outcomes = tokio::time::timeout(TEST_TIMEOUT, sup.close_all())
        .await
        .expect("close_all hung");
    assert_eq!(outcomes.len(), 3);
    for pipe in &pipes {
        assert!(!pipe.exists(), "endpoint {pipe:?} left on disk");
    }
    assert!(!sup.scratch_dir().exists());
    assert!(!store.contains("b2", "out.bin"));
}
