//! Content-addressed dataset cache
//!
//! Datasets are stored under a deterministic key derived from their URI.
//! Several worker processes may share one cache directory, so publishing
//! follows a fixed discipline:
//!
//! 1. a per-key lock file is taken with `create_new`
//! 2. the object is downloaded to a temp file inside the cache root
//! 3. the temp file is renamed onto the key path
//! 4. a `{"uri", "key"}` line is appended to `manifest.jsonl`
//!
//! A worker that loses the race finds the published blob and reuses it.
//! A lock older than the stale age is moved aside with a rename, so only
//! one waiter breaks it.

mod fetcher;

pub use fetcher::{
    CommandFetcher, DatasetFetcher, HttpFetcher, LocalFetcher, SchemeFetcher, uri_scheme,
};

#[cfg(test)]
pub use fetcher::MockDatasetFetcher;

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::HarnessConfig;
use crate::error::EvalError;

/// Manifest file name inside the cache root
pub const MANIFEST_FILE: &str = "manifest.jsonl";

/// Lock directory inside the cache root
pub const LOCK_DIR: &str = ".locks";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_LOCK_WAIT_MARGIN: Duration = Duration::from_secs(60);

static LOCK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Errors raised by the cache
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Failed to fetch {uri}: {message}")]
    Fetch { uri: String, message: String },

    #[error("Fetching {uri} timed out after {secs} seconds")]
    Timeout { uri: String, secs: u64 },

    #[error("Cache I/O error for {uri}: {message}")]
    Io { uri: String, message: String },

    #[error("Gave up after {secs} seconds waiting for another worker to fetch {uri}")]
    LockTimeout { uri: String, secs: u64 },
}

impl CacheError {
    pub fn fetch(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            uri: uri.into(),
            message: message.into(),
        }
    }

    pub fn io(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// URI the error refers to
    pub fn uri(&self) -> &str {
        match self {
            Self::Fetch { uri, .. }
            | Self::Timeout { uri, .. }
            | Self::Io { uri, .. }
            | Self::LockTimeout { uri, .. } => uri,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch_failed",
            Self::Timeout { .. } => "fetch_timeout",
            Self::Io { .. } => "cache_io",
            Self::LockTimeout { .. } => "lock_timeout",
        }
    }
}

impl From<CacheError> for EvalError {
    fn from(err: CacheError) -> Self {
        EvalError::data_staging(err.uri().to_string(), err.to_string())
    }
}

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub uri: String,
    pub key: String,
}

/// Deterministic cache key: 16 hex chars of SHA-256(uri), `__`, basename
pub fn cache_key(uri: &str) -> String {
    let digest = Sha256::digest(uri.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}__{}", &hex[..16], basename(uri))
}

/// Last non-empty path segment of a URI, without query or fragment
pub fn basename(uri: &str) -> String {
    let without_fragment = uri.split('#').next().unwrap_or(uri);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    path.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Local cache of remote datasets shared by all evaluations
pub struct CacheStore {
    root: PathBuf,
    fetcher: Arc<dyn DatasetFetcher>,
    lock_stale: Duration,
    lock_wait_margin: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("lock_stale", &self.lock_stale)
            .finish()
    }
}

impl CacheStore {
    /// Create a store at `root` using the given fetcher
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn DatasetFetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            lock_stale: Duration::from_secs(2 * 60 * 60),
            lock_wait_margin: DEFAULT_LOCK_WAIT_MARGIN,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a store from the harness config with scheme-based fetching
    pub fn from_config(config: &HarnessConfig) -> Result<Self, CacheError> {
        let fetcher = SchemeFetcher::new(&config.fetch_command)?;
        Ok(Self::new(config.cache_dir(), Arc::new(fetcher))
            .with_lock_stale(Duration::from_secs(config.lock_stale_secs)))
    }

    /// Age after which a lock file is treated as abandoned
    pub fn with_lock_stale(mut self, stale: Duration) -> Self {
        self.lock_stale = stale;
        self
    }

    /// Extra time a bounded fetch waits on a held lock beyond its download timeout
    pub fn with_lock_wait_margin(mut self, margin: Duration) -> Self {
        self.lock_wait_margin = margin;
        self
    }

    /// How often a waiter re-checks a held lock
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a URI is (or would be) cached at
    pub fn path_for(&self, uri: &str) -> PathBuf {
        self.root.join(cache_key(uri))
    }

    /// Whether the URI is recorded in the manifest and its blob exists
    pub async fn has(&self, uri: &str) -> bool {
        matches!(self.lookup(uri).await, Ok(Some(_)))
    }

    /// Fetch a URI into the cache, returning the local path
    pub async fn fetch(&self, uri: &str) -> Result<PathBuf, CacheError> {
        self.fetch_with_timeout(uri, None).await
    }

    /// Fetch a URI, bounding the download by `timeout`
    pub async fn fetch_with_timeout(
        &self,
        uri: &str,
        timeout: Option<Duration>,
    ) -> Result<PathBuf, CacheError> {
        if let Some(path) = self.lookup(uri).await? {
            tracing::debug!(uri = %uri, path = ?path, "cache hit");
            return Ok(path);
        }

        self.ensure_dirs(uri).await?;
        let key = cache_key(uri);
        let path = self.root.join(&key);

        if path.exists() {
            tracing::debug!(uri = %uri, key = %key, "blob already published");
            self.record(uri, &key).await?;
            return Ok(path);
        }

        let wait = timeout.map(|limit| limit + self.lock_wait_margin);
        let _lock = self.acquire_lock(uri, &key, wait).await?;

        // Another worker may have published while we waited.
        if path.exists() {
            self.record(uri, &key).await?;
            return Ok(path);
        }

        tracing::info!(uri = %uri, key = %key, "downloading dataset");
        self.download(uri, &key, &path, timeout).await?;
        self.record(uri, &key).await?;
        tracing::info!(uri = %uri, path = ?path, "dataset cached");

        Ok(path)
    }

    /// Fetch every distinct URI once, in order. Returns the failures.
    pub async fn prefetch(&self, uris: &[String]) -> Vec<CacheError> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = uris.iter().filter(|u| seen.insert(u.as_str())).collect();
        let total = unique.len();
        let mut failures = Vec::new();

        for (i, uri) in unique.into_iter().enumerate() {
            tracing::info!("[{}/{}] prefetching {}", i + 1, total, uri);
            if let Err(e) = self.fetch(uri).await {
                tracing::warn!(uri = %uri, error = %e, "prefetch failed");
                failures.push(e);
            }
        }

        failures
    }

    /// Parsed manifest: URI to key, first entry per URI wins
    pub async fn manifest(&self) -> Result<BTreeMap<String, String>, CacheError> {
        let path = self.root.join(MANIFEST_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(CacheError::io("", format!("read {:?}: {}", path, e))),
        };

        let mut entries = BTreeMap::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ManifestEntry>(line) {
                Ok(entry) => {
                    entries.entry(entry.uri).or_insert(entry.key);
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed manifest line {}: {}", lineno + 1, e);
                }
            }
        }
        Ok(entries)
    }

    async fn lookup(&self, uri: &str) -> Result<Option<PathBuf>, CacheError> {
        let manifest = self.manifest().await?;
        Ok(manifest
            .get(uri)
            .map(|key| self.root.join(key))
            .filter(|path| path.exists()))
    }

    async fn ensure_dirs(&self, uri: &str) -> Result<(), CacheError> {
        let locks = self.root.join(LOCK_DIR);
        tokio::fs::create_dir_all(&locks)
            .await
            .map_err(|e| CacheError::io(uri, format!("create {:?}: {}", locks, e)))
    }

    async fn record(&self, uri: &str, key: &str) -> Result<(), CacheError> {
        if self.manifest().await?.contains_key(uri) {
            return Ok(());
        }

        let entry = ManifestEntry {
            uri: uri.to_string(),
            key: key.to_string(),
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| CacheError::io(uri, e.to_string()))?;
        line.push('\n');

        let path = self.root.join(MANIFEST_FILE);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CacheError::io(uri, format!("open {:?}: {}", path, e)))?;
        // One write per line keeps appends from different processes whole.
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CacheError::io(uri, e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| CacheError::io(uri, e.to_string()))?;
        Ok(())
    }

    async fn download(
        &self,
        uri: &str,
        key: &str,
        path: &Path,
        timeout: Option<Duration>,
    ) -> Result<(), CacheError> {
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", key))
            .suffix(".partial")
            .tempfile_in(&self.root)
            .map_err(|e| CacheError::io(uri, format!("create temp file: {}", e)))?;

        let fetch = self.fetcher.fetch(uri, temp.path());
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| CacheError::Timeout {
                    uri: uri.to_string(),
                    secs: limit.as_secs(),
                })??,
            None => fetch.await?,
        }

        temp.persist(path)
            .map_err(|e| CacheError::io(uri, format!("publish {:?}: {}", path, e.error)))?;
        Ok(())
    }

    /// Take the per-key lock. With `wait` set, give up once it elapses
    /// instead of waiting for the holder's lock to go stale.
    async fn acquire_lock(
        &self,
        uri: &str,
        key: &str,
        wait: Option<Duration>,
    ) -> Result<LockGuard, CacheError> {
        let path = self.root.join(LOCK_DIR).join(format!("{}.lock", key));
        let started = Instant::now();
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    let token = lock_token();
                    let _ = writeln!(file, "{}", token);
                    return Ok(LockGuard { path, token });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.is_stale(&path) {
                        self.break_stale(&path);
                        continue;
                    }
                    if let Some(limit) = wait.filter(|limit| started.elapsed() >= *limit) {
                        tracing::warn!(uri = %uri, lock = ?path, "gave up waiting for cache lock");
                        return Err(CacheError::LockTimeout {
                            uri: uri.to_string(),
                            secs: limit.as_secs(),
                        });
                    }
                    tracing::debug!(uri = %uri, "waiting for cache lock");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    return Err(CacheError::io(uri, format!("lock {:?}: {}", path, e)));
                }
            }
        }
    }

    /// Move a stale lock aside. Only one waiter's rename succeeds; a waiter
    /// that moved a lock which has just been retaken puts it back.
    fn break_stale(&self, lock: &Path) {
        let aside = lock.with_extension(format!("lock.stale-{}", lock_token().replace(' ', "-")));
        if std::fs::rename(lock, &aside).is_err() {
            return;
        }

        if self.is_stale(&aside) {
            tracing::warn!(lock = ?lock, "breaking stale cache lock");
        } else if let Err(e) = std::fs::hard_link(&aside, lock) {
            tracing::warn!(lock = ?lock, error = %e, "failed to restore a live cache lock");
        }
        let _ = std::fs::remove_file(&aside);
    }

    fn is_stale(&self, lock: &Path) -> bool {
        std::fs::metadata(lock)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= self.lock_stale)
    }
}

/// Unique owner id written into a lock file
fn lock_token() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{} {} {}",
        std::process::id(),
        nanos,
        LOCK_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Holds a per-key lock file; removes it on drop if still ours
struct LockGuard {
    path: PathBuf,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim() == self.token => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    tracing::warn!(lock = ?self.path, error = %e, "failed to release cache lock");
                }
            }
            Ok(_) => tracing::warn!(lock = ?self.path, "cache lock was taken over, leaving it"),
            Err(e) => tracing::warn!(lock = ?self.path, error = %e, "cache lock vanished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn writing_mock(times: usize, content: &'static str) -> MockDatasetFetcher {
        let mut mock = MockDatasetFetcher::new();
        mock.expect_fetch().times(times).returning(move |_, dest| {
            std::fs::write(dest, content).unwrap();
            Ok(())
        });
        mock
    }

    /// Slow fetcher counting how often it is called
    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl DatasetFetcher for CountingFetcher {
        async fn fetch(&self, _uri: &str, dest: &Path) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            std::fs::write(dest, b"payload").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let key = cache_key("latch:///spatialbench/xenium/cells.h5ad");
        assert_eq!(key, cache_key("latch:///spatialbench/xenium/cells.h5ad"));
        assert!(key.ends_with("__cells.h5ad"));
        assert_eq!(key.split("__").next().unwrap().len(), 16);
        assert_ne!(key, cache_key("latch:///spatialbench/merfish/cells.h5ad"));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("https://host/data/x.csv?token=1#frag"), "x.csv");
        assert_eq!(basename("latch:///dir/sub/"), "sub");
        assert_eq!(basename("/tmp/local.h5ad"), "local.h5ad");
        assert_eq!(basename("https://host/"), "host");
        assert_eq!(basename("file:///"), "dataset");
    }

    #[tokio::test]
    async fn test_second_fetch_is_cache_hit() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(1, "cells")));

        let uri = "latch:///spatialbench/cells.h5ad";
        assert!(!store.has(uri).await);

        let first = store.fetch(uri).await.unwrap();
        let second = store.fetch(uri).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "cells");
        assert!(store.has(uri).await);
        assert_eq!(store.manifest().await.unwrap()[uri], cache_key(uri));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockDatasetFetcher::new();
        mock.expect_fetch()
            .times(1)
            .returning(|uri, _| Err(CacheError::fetch(uri, "403 Forbidden")));
        let store = CacheStore::new(dir.path(), Arc::new(mock));

        let uri = "latch:///private.h5ad";
        let err = store.fetch(uri).await.unwrap_err();
        assert_eq!(err.error_code(), "fetch_failed");
        assert!(!store.has(uri).await);
        assert!(!store.path_for(uri).exists());
        assert!(!dir.path().join(LOCK_DIR).join(format!("{}.lock", cache_key(uri))).exists());

        let staged: EvalError = err.into();
        assert_eq!(staged.error_code(), "data_staging");
    }

    #[tokio::test]
    async fn test_download_timeout() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(5),
        });
        let store = CacheStore::new(dir.path(), fetcher);

        let err = store
            .fetch_with_timeout("latch:///slow.h5ad", Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Timeout { .. }));
        assert!(!store.path_for("latch:///slow.h5ad").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetch_downloads_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
        });
        // Two stores over one directory stand in for two worker processes.
        let a = CacheStore::new(dir.path(), fetcher.clone())
            .with_poll_interval(Duration::from_millis(10));
        let b = CacheStore::new(dir.path(), fetcher.clone())
            .with_poll_interval(Duration::from_millis(10));

        let uri = "latch:///shared.h5ad";
        let (pa, pb) = tokio::join!(a.fetch(uri), b.fetch(uri));

        assert_eq!(pa.unwrap(), pb.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let manifest = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(manifest.lines().count() >= 1);
        assert_eq!(a.manifest().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_published_blob_is_reused_without_manifest_entry() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(0, "")));

        let uri = "latch:///already.csv";
        std::fs::write(store.path_for(uri), "x").unwrap();

        let path = store.fetch(uri).await.unwrap();
        assert_eq!(path, store.path_for(uri));
        assert!(store.has(uri).await);
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(1, "fresh")))
            .with_lock_stale(Duration::ZERO);

        let uri = "latch:///locked.h5ad";
        let locks = dir.path().join(LOCK_DIR);
        std::fs::create_dir_all(&locks).unwrap();
        std::fs::write(locks.join(format!("{}.lock", cache_key(uri))), "999999").unwrap();

        let path = store.fetch(uri).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_live_lock_wait_is_bounded() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(0, "")))
            .with_lock_wait_margin(Duration::ZERO)
            .with_poll_interval(Duration::from_millis(10));

        let uri = "latch:///busy.h5ad";
        let locks = dir.path().join(LOCK_DIR);
        std::fs::create_dir_all(&locks).unwrap();
        let lock = locks.join(format!("{}.lock", cache_key(uri)));
        std::fs::write(&lock, "12345 0 0").unwrap();

        let started = Instant::now();
        let err = store
            .fetch_with_timeout(uri, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::LockTimeout { .. }));
        assert_eq!(err.error_code(), "lock_timeout");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(lock.exists());
    }

    #[test]
    fn test_breaking_a_live_lock_restores_it() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(0, "")));
        let lock = dir.path().join("k.lock");
        std::fs::write(&lock, "owner").unwrap();

        // Another waiter retook the lock between our staleness check and the break.
        store.break_stale(&lock);
        assert_eq!(std::fs::read_to_string(&lock).unwrap(), "owner");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let stale = CacheStore::new(dir.path(), Arc::new(writing_mock(0, "")))
            .with_lock_stale(Duration::ZERO);
        stale.break_stale(&lock);
        assert!(!lock.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // A second breaker of the same lock finds nothing to move.
        stale.break_stale(&lock);
        assert!(!lock.exists());
    }

    #[test]
    fn test_lock_guard_leaves_foreign_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("k.lock");
        std::fs::write(&path, "someone else\n").unwrap();
        drop(LockGuard {
            path: path.clone(),
            token: "me".to_string(),
        });
        assert!(path.exists());

        std::fs::write(&path, "me\n").unwrap();
        drop(LockGuard {
            path: path.clone(),
            token: "me".to_string(),
        });
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_manifest_first_entry_wins_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "{\"uri\":\"u\",\"key\":\"first\"}\nnot json\n{\"uri\":\"u\",\"key\":\"second\"}\n",
        )
        .unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(0, "")));

        let manifest = store.manifest().await.unwrap();
        assert_eq!(manifest["u"], "first");
    }

    #[tokio::test]
    async fn test_prefetch_deduplicates() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path(), Arc::new(writing_mock(2, "d")));

        let uris = vec![
            "latch:///a.h5ad".to_string(),
            "latch:///b.csv".to_string(),
            "latch:///a.h5ad".to_string(),
        ];
        let failures = store.prefetch(&uris).await;
        assert!(failures.is_empty());
        assert!(store.has("latch:///a.h5ad").await);
        assert!(store.has("latch:///b.csv").await);
    }
}
