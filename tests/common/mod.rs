#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vessel_registry::error::{RegistryError, Result};
use vessel_registry::lookup::{LookupCandidate, VesselLookup};
use vessel_registry::registry::{SqliteRegistry, VesselRegistry};
use vessel_registry::vessel::VesselRecord;

/// Write `csv_text` as a zstd archive under `dir`.
pub fn write_archive(dir: &Path, file_name: &str, csv_text: &str) -> PathBuf {
    let path = dir.join(file_name);
    let compressed = zstd::encode_all(csv_text.as_bytes(), 3).unwrap();
    std::fs::write(&path, compressed).unwrap();
    path
}

/// In-memory SQLite registry with switchable failures and call counters.
pub struct TestRegistry {
    pub inner: SqliteRegistry,
    pub unreachable: bool,
    pub fail_writes: bool,
    /// Batches containing any of these names are rejected.
    pub poisoned: Vec<String>,
    pub gets: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self {
            inner: SqliteRegistry::in_memory().unwrap(),
            unreachable: false,
            fail_writes: false,
            poisoned: Vec::new(),
            gets: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.count().unwrap()
    }
}

#[async_trait]
impl VesselRegistry for TestRegistry {
    async fn ping(&self) -> Result<()> {
        if self.unreachable {
            return Err(RegistryError::Store("connection refused".to_string()));
        }
        self.inner.ping().await
    }

    async fn upsert_batch(&self, records: &[VesselRecord]) -> Result<usize> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes || records.iter().any(|r| self.poisoned.contains(&r.name)) {
            return Err(RegistryError::Store("write rejected".to_string()));
        }
        self.inner.upsert_batch(records).await
    }

    async fn get(&self, name: &str) -> Result<Option<VesselRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(name).await
    }

    fn backend_name(&self) -> &str {
        "test"
    }
}

/// Lookup double returning fixed candidates per search term.
pub struct TestLookup {
    pub answers: Vec<(String, Vec<LookupCandidate>)>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub terms: Mutex<Vec<String>>,
}

impl TestLookup {
    pub fn new() -> Self {
        Self {
            answers: Vec::new(),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            terms: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, term: &str, candidates: Vec<LookupCandidate>) -> Self {
        self.answers.push((term.to_string(), candidates));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VesselLookup for TestLookup {
    async fn search(&self, name: &str) -> Result<Vec<LookupCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.terms.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RegistryError::LookupServiceFailure("HTTP 429".to_string()));
        }
        Ok(self
            .answers
            .iter()
            .find(|(term, _)| term == name)
            .map(|(_, candidates)| candidates.clone())
            .unwrap_or_default())
    }
}

pub fn candidate(mmsi: Option<&str>, imo: Option<&str>, type_summary: &str) -> LookupCandidate {
    LookupCandidate {
        mmsi: mmsi.map(str::to_string),
        imo: imo.map(str::to_string),
        name: None,
        type_summary: Some(type_summary.to_string()),
    }
}

/// A request seen by [`serve`].
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub target: String,
    pub head: String,
}

/// Minimal HTTP/1.1 responder. `respond` maps a request target to
/// `(status, body)`. Returns the base URL and the log of seen requests.
pub async fn serve<F>(respond: F) -> (String, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(&str) -> (u16, Vec<u8>) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let respond = respond.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let target = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                log.lock().unwrap().push(SeenRequest {
                    target: target.clone(),
                    head: head.clone(),
                });

                let (status, body) = respond(&target);
                let reason = if status == 200 { "OK" } else { "Error" };
                let header = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                    status,
                    reason,
                    body.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), seen)
}
