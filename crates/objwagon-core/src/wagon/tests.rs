//! Tests for the wagon over in-memory and filesystem stores.

use super::{Session, Wagon};
use crate::config::{RepositoryConfig, WagonConfig};
use crate::retry::{AttemptEvent, AttemptObserver, RetryPolicy, TransferErrorKind};
use crate::store::{BackendKind, Fault, MemoryStore, BINARY_CONTENT_TYPE, XML_CONTENT_TYPE};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const POM: &str = "<project><modelVersion>4.0.0</modelVersion></project>\n";

/// Records (attempt, will_retry) for every attempt.
#[derive(Default)]
struct Recorder(Mutex<Vec<(u32, bool)>>);

impl AttemptObserver for Recorder {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        self.0.lock().unwrap().push((event.attempt, event.will_retry()));
    }
}

fn fast(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Duration::ZERO,
        ..RetryPolicy::gcs()
    }
}

fn wagon_with(store: &Arc<MemoryStore>, base: &str) -> (Wagon, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let wagon = Wagon::new(Session::new(store.clone(), "bucket", base))
        .with_policy(fast(4))
        .with_observer(recorder.clone());
    (wagon, recorder)
}

fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn default_policy_follows_backend() {
    let s3 = Wagon::new(Session::new(
        Arc::new(MemoryStore::new(BackendKind::S3)),
        "b",
        "",
    ));
    assert_eq!(s3.policy().max_attempts, 3);
    assert_eq!(s3.policy().backoff, Duration::from_secs(5));
    let gcs = Wagon::new(Session::new(
        Arc::new(MemoryStore::new(BackendKind::Gcs)),
        "b",
        "",
    ));
    assert_eq!(gcs.policy().max_attempts, 10);
}

#[test]
fn keys_concatenate_base_directory() {
    let session = Session::new(Arc::new(MemoryStore::new(BackendKind::Gcs)), "b", "releases/");
    assert_eq!(session.key("com/acme/a.jar"), "releases/com/acme/a.jar");
    let bare = Session::new(Arc::new(MemoryStore::new(BackendKind::Gcs)), "b", "releases");
    assert_eq!(bare.key("a.jar"), "releasesa.jar");
}

#[test]
fn get_writes_destination_and_reports_bytes_once() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    let data = body(10_000);
    store.insert("base/a/b.jar", data.clone());
    let (wagon, recorder) = wagon_with(&store, "base/");

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested/b.jar");
    let mut seen = Vec::new();
    let bytes = wagon
        .get_resource("a/b.jar", &dest, &mut |b: &[u8]| seen.extend_from_slice(b))
        .unwrap();

    assert_eq!(bytes, 10_000);
    assert_eq!(seen, data);
    assert_eq!(std::fs::read(&dest).unwrap(), data);
    assert!(!dir.path().join("nested/b.jar.part").exists());
    assert_eq!(*recorder.0.lock().unwrap(), vec![(1, false)]);
}

#[test]
fn get_retries_dropped_connections_without_double_reporting() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    let data = body(26);
    store.insert("k.bin", data.clone());
    store.push_fault(Fault::dropped_after(9));
    store.push_fault(Fault::dropped_after(18));
    let (wagon, recorder) = wagon_with(&store, "");

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("k.bin");
    let mut seen = Vec::new();
    wagon
        .get_resource("k.bin", &dest, &mut |b: &[u8]| seen.extend_from_slice(b))
        .unwrap();

    assert_eq!(seen, data);
    assert_eq!(std::fs::read(&dest).unwrap(), data);
    assert_eq!(store.transfer_calls(), 3);
    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![(1, true), (2, true), (3, false)]
    );
}

#[test]
fn get_missing_object_is_not_found_without_retry() {
    let store = Arc::new(MemoryStore::new(BackendKind::S3));
    let (wagon, recorder) = wagon_with(&store, "base/");
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.jar");

    let err = wagon
        .get_resource("missing.jar", &dest, &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::NotFound);
    assert_eq!(err.key(), "base/missing.jar");
    assert!(err.to_string().contains("does not exist"));
    assert_eq!(store.transfer_calls(), 0);
    assert_eq!(recorder.0.lock().unwrap().len(), 1);
    assert!(!dest.exists());
}

#[test]
fn get_forbidden_is_not_retried() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    store.insert("secret.jar", b"x".to_vec());
    store.push_fault(Fault::status(403));
    let (wagon, _) = wagon_with(&store, "");
    let dir = tempfile::tempdir().unwrap();

    let err = wagon
        .get_resource("secret.jar", &dir.path().join("s.jar"), &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::PermissionDenied);
    assert_eq!(err.to_string(), "Error reading 'secret.jar'");
    assert_eq!(store.transfer_calls(), 1);
}

#[test]
fn get_gives_up_after_budget_and_cleans_part_file() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    store.insert("flaky.jar", body(100));
    for _ in 0..4 {
        store.push_fault(Fault::status(503));
    }
    let (wagon, recorder) = wagon_with(&store, "");
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("flaky.jar");

    let err = wagon
        .get_resource("flaky.jar", &dest, &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::TransferFailed);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(store.transfer_calls(), 4);
    assert_eq!(recorder.0.lock().unwrap().last(), Some(&(4, false)));
    assert!(!dest.exists());
    assert!(!dir.path().join("flaky.jar.part").exists());
}

#[test]
fn put_binary_with_retries_reports_source_once() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    store.push_fault(Fault::dropped_after(3));
    store.push_fault(Fault::dropped_after(7));
    let (wagon, _) = wagon_with(&store, "base/");

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.jar");
    let data = body(20);
    std::fs::write(&src, &data).unwrap();

    let mut seen = Vec::new();
    let bytes = wagon
        .put_resource(&src, "g/a.jar", &mut |b: &[u8]| seen.extend_from_slice(b))
        .unwrap();
    assert_eq!(bytes, 20);
    assert_eq!(seen, data);
    assert_eq!(store.get("base/g/a.jar").unwrap(), data);
    assert_eq!(store.content_type("base/g/a.jar").as_deref(), Some(BINARY_CONTENT_TYPE));
    assert_eq!(store.transfer_calls(), 3);
}

#[test]
fn put_xml_is_validated_and_typed() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    let (wagon, _) = wagon_with(&store, "");
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a-1.0.xml");
    std::fs::write(&src, POM).unwrap();

    wagon
        .put_resource(&src, "g/a/1.0/a-1.0.xml", &mut |_: &[u8]| {})
        .unwrap();
    assert_eq!(store.get("g/a/1.0/a-1.0.xml").unwrap(), POM.as_bytes());
    assert_eq!(
        store.content_type("g/a/1.0/a-1.0.xml").as_deref(),
        Some(XML_CONTENT_TYPE)
    );
}

#[test]
fn put_malformed_metadata_never_uploads() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    let (wagon, recorder) = wagon_with(&store, "");
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("maven-metadata.xml");
    std::fs::write(&src, "<metadata><versioning>").unwrap();

    let err = wagon
        .put_resource(&src, "g/a/maven-metadata.xml", &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::TransferFailed);
    assert!(err.to_string().contains("please try to rebuild"));
    assert_eq!(store.transfer_calls(), 0);
    assert!(recorder.0.lock().unwrap().is_empty());
    assert!(store.get("g/a/maven-metadata.xml").is_none());
}

#[test]
fn put_missing_source() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    let (wagon, _) = wagon_with(&store, "");
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("gone.jar");

    let err = wagon
        .put_resource(&src, "gone.jar", &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::TransferFailed);
    assert!(err.to_string().starts_with("Cannot find file: "));
    assert_eq!(store.transfer_calls(), 0);
}

#[test]
fn exists_and_newer() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    store.insert_with_updated("base/old.jar", "x", Some(1_000));
    store.insert_with_updated("base/undated.jar", "x", None);
    let (wagon, _) = wagon_with(&store, "base/");

    assert!(wagon.resource_exists("old.jar").unwrap());
    assert!(!wagon.resource_exists("nope.jar").unwrap());

    assert!(wagon.is_remote_newer("old.jar", 999).unwrap());
    assert!(!wagon.is_remote_newer("old.jar", 1_000).unwrap());
    assert!(wagon.is_remote_newer("undated.jar", i64::MAX).unwrap());

    let err = wagon.is_remote_newer("nope.jar", 0).unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::NotFound);
    assert_eq!(err.key(), "base/nope.jar");
}

#[test]
fn list_directory_recurses_into_nested_prefixes() {
    let store = Arc::new(MemoryStore::new(BackendKind::Gcs));
    for key in [
        "base/g/a/maven-metadata.xml",
        "base/g/a/1.0/a-1.0.jar",
        "base/g/a/1.0/a-1.0.pom",
        "base/g/b/other.jar",
    ] {
        store.insert(key, "x");
    }
    let (wagon, _) = wagon_with(&store, "base/");

    let listing = wagon.list_directory("g/a").unwrap();
    assert_eq!(
        listing,
        vec!["maven-metadata.xml", "1.0/", "1.0/a-1.0.jar", "1.0/a-1.0.pom"]
    );
    assert!(wagon.list_directory("g/zzz/").unwrap().is_empty());
}

#[test]
fn connect_requires_bucket() {
    let cfg = WagonConfig::default();
    assert!(Wagon::connect(&cfg).is_err());
}

#[test]
fn connect_fs_backend_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let cfg = WagonConfig {
        repository: RepositoryConfig {
            backend: BackendKind::Fs,
            bucket: root.path().to_string_lossy().into_owned(),
            base_directory: "repo/".into(),
            ..RepositoryConfig::default()
        },
        ..WagonConfig::default()
    };
    let wagon = Wagon::connect(&cfg).unwrap();
    assert_eq!(wagon.session().backend(), BackendKind::Fs);
    assert_eq!(wagon.policy().max_attempts, 10);

    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("a.pom");
    std::fs::write(&src, POM).unwrap();
    wagon.put_resource(&src, "g/a.pom", &mut |_: &[u8]| {}).unwrap();
    assert!(root.path().join("repo/g/a.pom").is_file());

    let dest = work.path().join("back.pom");
    wagon.get_resource("g/a.pom", &dest, &mut |_: &[u8]| {}).unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), POM);
    assert_eq!(wagon.list_directory("g").unwrap(), vec!["a.pom"]);
    wagon.disconnect();
}

#[test]
fn fs_put_cannot_escape_bucket() {
    let outer = tempfile::tempdir().unwrap();
    let bucket = outer.path().join("bucket");
    std::fs::create_dir_all(&bucket).unwrap();
    let cfg = WagonConfig {
        repository: RepositoryConfig {
            backend: BackendKind::Fs,
            bucket: bucket.to_string_lossy().into_owned(),
            ..RepositoryConfig::default()
        },
        ..WagonConfig::default()
    };
    let wagon = Wagon::connect(&cfg).unwrap().with_policy(fast(3));

    let src = outer.path().join("payload.jar");
    std::fs::write(&src, b"jar").unwrap();
    let err = wagon
        .put_resource(&src, "../../escaped.jar", &mut |_: &[u8]| {})
        .unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::PermissionDenied);
    assert!(!outer.path().join("escaped.jar").exists());
    assert!(!outer.path().parent().unwrap().join("escaped.jar").exists());
}
