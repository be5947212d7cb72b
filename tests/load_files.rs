//! End-to-end tests for loading a directory of gzip files
//!
//! Each test builds its input under a temporary directory and drives
//! [`Loader`] through discovery, the pipeline and file marking.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flate2::Compression;
use flate2::write::GzEncoder;
use memc_load::{
    Config, DotRenamer, Loader, MarkStatus, StoreClient, StoreConnector, StoreError, Verdict,
    codec,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

fn write_gzip(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    for line in lines {
        writeln!(encoder, "{line}").unwrap();
    }
    encoder.finish().unwrap();
    path
}

fn config_for(dir: &Path) -> Config {
    Config {
        pattern: format!("{}/*.tsv.gz", dir.display()),
        workers: 4,
        queue_capacity: 8,
        ..Config::default()
    }
}

/// In-memory store shared by every endpoint, keyed by (endpoint, key)
#[derive(Default)]
struct MemoryBackend {
    values: Mutex<HashMap<(String, String), Vec<u8>>>,
}

struct MemoryClient {
    address: String,
    backend: Arc<MemoryBackend>,
}

#[async_trait::async_trait]
impl StoreClient for MemoryClient {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.backend
            .values
            .lock()
            .unwrap()
            .insert((self.address.clone(), key.to_string()), value.to_vec());
        Ok(())
    }
}

struct MemoryConnector(Arc<MemoryBackend>);

impl StoreConnector for MemoryConnector {
    fn connect(&self, address: &str) -> Arc<dyn StoreClient> {
        Arc::new(MemoryClient {
            address: address.to_string(),
            backend: Arc::clone(&self.0),
        })
    }
}

#[tokio::test]
async fn loads_every_file_and_marks_it() {
    let dir = TempDir::new().unwrap();
    write_gzip(
        dir.path(),
        "20170929000000.tsv.gz",
        &[
            "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23",
            "gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t7423,424",
        ],
    );
    write_gzip(
        dir.path(),
        "20170929000100.tsv.gz",
        &["adid\tA\t1.0\t2.0\t5", "dvid\tD\t3.0\t4.0\t6,x"],
    );
    let backend = Arc::new(MemoryBackend::default());
    let loader = Loader::new(
        config_for(dir.path()),
        Arc::new(MemoryConnector(Arc::clone(&backend))),
        Arc::new(DotRenamer),
    )
    .unwrap();

    let summary = loader.run().await.unwrap();

    assert_eq!(summary.files.len(), 2);
    assert_eq!(summary.successful_files(), 2);
    assert_eq!(summary.totals().processed, 4);
    assert_eq!(summary.totals().errors, 0);
    for report in &summary.files {
        assert_eq!(report.verdict, Verdict::Accepted { error_rate: 0.0 });
        let MarkStatus::Marked(ref marked) = report.mark else {
            panic!("file not marked: {:?}", report.mark);
        };
        assert!(marked.file_name().unwrap().to_str().unwrap().starts_with('.'));
        assert!(marked.exists());
        assert!(!report.path.exists());
    }

    let values = backend.values.lock().unwrap();
    assert_eq!(values.len(), 4);
    let payload = &values[&("127.0.0.1:33013".to_string(), "idfa:1rfw452y52g2gq4g".to_string())];
    let decoded = codec::decode(payload).unwrap();
    assert_eq!(decoded.apps, vec![1423, 43, 567, 3, 7, 23]);
    let payload = &values[&("127.0.0.1:33016".to_string(), "dvid:D".to_string())];
    assert_eq!(codec::decode(payload).unwrap().apps, vec![6]);
}

#[tokio::test]
async fn second_run_finds_nothing_left() {
    let dir = TempDir::new().unwrap();
    write_gzip(dir.path(), "a.tsv.gz", &["idfa\tX\t1.0\t2.0\t1"]);
    let config = Config {
        dry_run: true,
        ..config_for(dir.path())
    };
    let loader = Loader::with_memcache(config).unwrap();

    let first = loader.run().await.unwrap();
    let second = loader.run().await.unwrap();

    assert_eq!(first.files.len(), 1);
    assert_eq!(first.totals().processed, 1);
    assert!(second.files.is_empty());
    assert!(dir.path().join(".a.tsv.gz").exists());
}

#[tokio::test]
async fn rejected_file_is_still_marked() {
    let dir = TempDir::new().unwrap();
    write_gzip(
        dir.path(),
        "noisy.tsv.gz",
        &["idfa\tX\t1.0\t2.0\t1", "broken line", "gaid\tY\tnan-ish\t2.0\t1"],
    );
    let config = Config {
        dry_run: true,
        ..config_for(dir.path())
    };

    let summary = Loader::with_memcache(config).unwrap().run().await.unwrap();

    let report = &summary.files[0];
    assert!(matches!(report.verdict, Verdict::Rejected { .. }));
    assert!(matches!(report.mark, MarkStatus::Marked(_)));
    assert_eq!(summary.successful_files(), 0);
}

#[tokio::test]
async fn invalid_configuration_is_refused() {
    let config = Config {
        workers: 0,
        ..Config::default()
    };
    assert!(Loader::with_memcache(config).is_err());
}

#[tokio::test]
async fn invalid_pattern_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        pattern: format!("{}/[oops*.gz", dir.path().display()),
        ..Config::default()
    };
    let loader = Loader::with_memcache(config).unwrap();

    assert!(loader.run().await.is_err());
}

/// Minimal memcached stand-in answering `STORED` to every `set`
async fn fake_memcached() -> (String, Arc<Mutex<HashMap<String, Vec<u8>>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let stored = Arc::new(Mutex::new(HashMap::new()));

    let server_stored = Arc::clone(&stored);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let stored = Arc::clone(&server_stored);
            tokio::spawn(async move {
                let mut socket = BufReader::new(socket);
                loop {
                    let mut header = String::new();
                    if socket.read_line(&mut header).await.unwrap_or(0) == 0 {
                        return;
                    }
                    let parts: Vec<&str> = header.split_whitespace().collect();
                    let len: usize = parts[4].parse().unwrap();
                    let mut value = vec![0u8; len + 2];
                    socket.read_exact(&mut value).await.unwrap();
                    value.truncate(len);
                    stored.lock().unwrap().insert(parts[1].to_string(), value);
                    socket.get_mut().write_all(b"STORED\r\n").await.unwrap();
                }
            });
        }
    });

    (address, stored)
}

#[tokio::test]
async fn writes_reach_a_memcached_server() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..50)
        .map(|i| format!("idfa\tdev{i}\t10.5\t-20.25\t{i},{}", i * 2))
        .collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    write_gzip(dir.path(), "live.tsv.gz", &refs);

    let (address, stored) = fake_memcached().await;
    let mut config = config_for(dir.path());
    config.routes = [("idfa".to_string(), address)].into_iter().collect();
    config.store.io_timeout = Duration::from_secs(5);

    let summary = Loader::with_memcache(config).unwrap().run().await.unwrap();

    assert_eq!(summary.totals().processed, 50);
    assert_eq!(summary.totals().errors, 0);
    let stored = stored.lock().unwrap();
    assert_eq!(stored.len(), 50);
    let decoded = codec::decode(&stored["idfa:dev7"]).unwrap();
    assert_eq!(decoded.apps, vec![7, 14]);
    assert_eq!(decoded.lat, Some(10.5));
    assert_eq!(decoded.lon, Some(-20.25));
}

#[tokio::test]
async fn unreachable_store_counts_errors_and_rejects() {
    let dir = TempDir::new().unwrap();
    write_gzip(
        dir.path(),
        "down.tsv.gz",
        &["idfa\tA\t1.0\t2.0\t1", "idfa\tB\t1.0\t2.0\t2"],
    );
    // Bind then drop a listener to get a port nobody listens on
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let mut config = config_for(dir.path());
    config.routes = [("idfa".to_string(), address)].into_iter().collect();
    config.store.connect_timeout = Duration::from_millis(500);

    let summary = Loader::with_memcache(config).unwrap().run().await.unwrap();

    let report = &summary.files[0];
    assert_eq!(report.tally.errors, 2);
    assert_eq!(report.tally.processed, 0);
    assert_eq!(report.verdict, Verdict::Empty);
    assert!(matches!(report.mark, MarkStatus::Marked(_)));
}
