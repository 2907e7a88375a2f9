use std::sync::Once;
use std::time::Duration;

use fdstore::{Store, StoreConfig, StoreError};
use tempfile::tempdir;

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber once per test binary so scheduling
/// decisions (eviction, rescue, poisoning) are visible with
/// `RUST_LOG=fdstore=trace cargo test -- --nocapture` when a test fails.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn store(dir: &std::path::Path, max_open_files: usize) -> Store {
    init_tracing();
    Store::new(StoreConfig::new(dir.to_path_buf(), max_open_files)).expect("valid config")
}

#[tokio::test]
async fn basic_round_trip() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 2);

    let handle = store.storage_for("a");
    handle.write(0, &b"hello "[..]).await.unwrap();
    handle.write(6, &b"world!"[..]).await.unwrap();

    let bytes = handle.read(0, 12).await.unwrap();
    assert_eq!(&bytes[..], b"hello world!");
}

#[tokio::test]
async fn eviction_under_pressure() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 2);

    for i in 0..10 {
        let short_path = format!("f{i}");
        let handle = store.storage_for(&short_path);
        handle.write(0, vec![i as u8]).await.unwrap();
    }

    for i in 0..10 {
        let on_disk = std::fs::read(dir.path().join(format!("f{i}"))).unwrap();
        assert_eq!(on_disk, vec![i as u8]);
    }
}

#[tokio::test]
async fn interleaved_large_io() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);
    let handle = store.storage_for("big");

    handle.write(0, vec![0u8; 2048]).await.unwrap();
    handle.write(1024, vec![0u8; 32768]).await.unwrap();

    let a = handle.read(0, 2048);
    let b = handle.read(1024, 32768);
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.unwrap().len(), 2048);
    assert_eq!(b.unwrap().len(), 32768);
}

#[tokio::test]
async fn re_rescue_during_drain() {
    let dir = tempdir().unwrap();
    // max_open_files = 1 so the second path forces the first to start
    // draining before we race a new op in against it.
    let store = store(dir.path(), 1);

    let a = store.storage_for("a");
    a.write(0, &b"first"[..]).await.unwrap();

    // Pressure the sole FD slot so "a" is pushed toward Draining/Closed.
    let b = store.storage_for("b");
    b.write(0, &b"second"[..]).await.unwrap();

    // New op against "a" should still be served, whether or not it was
    // mid-drain when this arrived.
    let bytes = a.read(0, 5).await.unwrap();
    assert_eq!(&bytes[..], b"first");
}

#[tokio::test]
async fn lazy_directory_creation() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);

    let handle = store.storage_for("sub/nested/leaf");
    handle.write(0, &b"x"[..]).await.unwrap();

    assert!(dir.path().join("sub/nested").is_dir());
    assert_eq!(std::fs::read(dir.path().join("sub/nested/leaf")).unwrap(), b"x");
}

#[tokio::test]
async fn fd_budget_saturation_raises_no_error() {
    let dir = tempdir().unwrap();
    let n = 3;
    let store = store(dir.path(), n);

    let mut joins = Vec::new();
    for i in 0..(n + 1) {
        let handle = store.storage_for(format!("hot{i}"));
        joins.push(tokio::spawn(async move {
            for _ in 0..5 {
                handle.write(0, &b"x"[..]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
                handle.read(0, 1).await.unwrap();
            }
        }));
    }
    for j in joins {
        j.await.unwrap();
    }
}

#[tokio::test]
async fn poisoned_worker_does_not_affect_other_paths() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);

    // "blocked" collides with a directory, so opening it as a file fails.
    std::fs::create_dir(dir.path().join("blocked")).unwrap();

    let blocked = store.storage_for("blocked");
    let err = blocked.write(0, &b"x"[..]).await.unwrap_err();
    assert!(matches!(err, StoreError::WorkerPoisoned { .. }));

    // Further ops against the same poisoned path fail the same way.
    let err2 = blocked.read(0, 1).await.unwrap_err();
    assert!(matches!(err2, StoreError::WorkerPoisoned { .. }));

    // A healthy, unrelated path is unaffected.
    let healthy = store.storage_for("healthy");
    healthy.write(0, &b"ok"[..]).await.unwrap();
    assert_eq!(&healthy.read(0, 2).await.unwrap()[..], b"ok");
}

#[tokio::test]
async fn path_escape_is_rejected() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);

    let outside = store.storage_for("../outside");
    let err = outside.write(0, &b"x"[..]).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidDirPath(..)));

    let absolute = store.storage_for("/etc/passwd");
    let err = absolute.read(0, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidDirPath(..)));

    // Nothing was ever created on disk for either rejected path.
    assert!(!dir.path().join("../outside").exists());
}

#[tokio::test]
async fn read_zero_size_is_rejected_synchronously() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);
    let handle = store.storage_for("a");

    let err = handle.read(0, 0).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidReadSize));
}

#[tokio::test]
async fn read_past_eof_is_short_read() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);
    let handle = store.storage_for("a");

    handle.write(0, &b"hi"[..]).await.unwrap();
    let err = handle.read(0, 100).await.unwrap_err();
    assert!(matches!(err, StoreError::ShortRead { .. }));
}

#[tokio::test]
async fn repeated_storage_for_returns_same_handle() {
    let dir = tempdir().unwrap();
    let store = store(dir.path(), 4);

    let a1 = store.storage_for("a");
    let a2 = store.storage_for("a");
    a1.write(0, &b"x"[..]).await.unwrap();
    assert_eq!(&a2.read(0, 1).await.unwrap()[..], b"x");
}

#[test]
fn zero_max_open_files_is_construction_error() {
    let dir = tempdir().unwrap();
    let result = StoreConfig::new(dir.path().to_path_buf(), 0).validate();
    assert!(result.is_err());
}
