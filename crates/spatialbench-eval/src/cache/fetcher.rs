//! Dataset retrieval backends
//!
//! A fetcher copies the object behind a URI to a local destination path.
//! The cache store decides where that path is and publishes it afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::CacheError;

/// Retrieves a remote dataset into a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    /// Copy the object at `uri` to `dest`, overwriting it
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<(), CacheError>;
}

/// Scheme of a URI (`"https"` for `https://host/x`), lowercase
pub fn uri_scheme(uri: &str) -> Option<String> {
    let (scheme, _) = uri.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Copies `file://` URIs and bare paths
#[derive(Debug, Default, Clone)]
pub struct LocalFetcher;

impl LocalFetcher {
    fn source_path(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
    }
}

#[async_trait]
impl DatasetFetcher for LocalFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<(), CacheError> {
        let source = Self::source_path(uri);
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| CacheError::fetch(uri, format!("copy from {:?} failed: {}", source, e)))?;
        Ok(())
    }
}

/// Streams `http://` and `https://` URIs to disk
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<(), CacheError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| CacheError::fetch(uri, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::fetch(uri, format!("HTTP {}", status)));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| CacheError::io(uri, format!("create {:?}: {}", dest, e)))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CacheError::fetch(uri, e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CacheError::io(uri, e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| CacheError::io(uri, e.to_string()))?;

        tracing::debug!(uri = %uri, bytes = written, "download complete");
        Ok(())
    }
}

/// Runs an external copy command, e.g. `latch cp {uri} {dest}`
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: String,
    args: Vec<String>,
}

impl CommandFetcher {
    /// Create from a full command line; `{uri}` and `{dest}` are substituted
    pub fn new(command: &[String]) -> Result<Self, CacheError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| CacheError::io("", "fetch command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, uri: &str, dest: &Path) -> Vec<String> {
        let dest = dest.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{uri}", uri).replace("{dest}", &dest))
            .collect()
    }
}

#[async_trait]
impl DatasetFetcher for CommandFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<(), CacheError> {
        let args = self.render_args(uri, dest);
        tracing::debug!(program = %self.program, ?args, "running fetch command");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CacheError::fetch(uri, format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CacheError::fetch(
                uri,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        if !dest.exists() {
            return Err(CacheError::fetch(
                uri,
                format!("{} did not produce {:?}", self.program, dest),
            ));
        }
        Ok(())
    }
}

/// Dispatches on the URI scheme: http(s) to HTTP, file or none to local,
/// anything else to the external command
pub struct SchemeFetcher {
    local: LocalFetcher,
    http: HttpFetcher,
    command: CommandFetcher,
}

impl SchemeFetcher {
    pub fn new(fetch_command: &[String]) -> Result<Self, CacheError> {
        Ok(Self {
            local: LocalFetcher,
            http: HttpFetcher::new(),
            command: CommandFetcher::new(fetch_command)?,
        })
    }

    fn backend(&self, uri: &str) -> &dyn DatasetFetcher {
        match uri_scheme(uri).as_deref() {
            Some("http") | Some("https") => &self.http,
            Some("file") | None => &self.local,
            Some(_) => &self.command,
        }
    }
}

#[async_trait]
impl DatasetFetcher for SchemeFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<(), CacheError> {
        self.backend(uri).fetch(uri, dest).await
    }
}
