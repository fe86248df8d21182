// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HttpRuntimeClient` speaks plain HTTP/JSON to the in-container agent's
//! REST surface, and `RuntimeClientPool` is the process-wide LRU+TTL cache
//! of clients (and their cached `/meta`) keyed by endpoint URL (spec §4.3).
//!
//! The pool mutex guards only the map; client construction and `/meta`
//! fetches happen outside the lock (§5 "Adapter pool").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use sandbox_core::{Error, ExecutionResult, FileEntry, Meta, Result, RuntimeClient, RuntimeClientFactory};

/// A `RuntimeClient` bound to exactly one runtime endpoint, speaking HTTP.
pub struct HttpRuntimeClient {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpRuntimeClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        decode_json(resp).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        decode_json(resp).await
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>().await.map_err(|e| Error::RuntimeError(format!("bad response body: {e}")))
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(Error::RuntimeError(format!("runtime responded {status}: {body}")))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(Duration::from_secs(0))
    } else {
        Error::RuntimeError(format!("transport error: {e}"))
    }
}

#[derive(serde::Serialize)]
struct WriteFileBody<'a> {
    content: &'a str,
}

#[derive(serde::Serialize)]
struct ExecShellBody<'a> {
    command: &'a str,
    timeout_secs: u64,
    cwd: Option<&'a str>,
}

#[derive(serde::Serialize)]
struct ExecPythonBody<'a> {
    code: &'a str,
    timeout_secs: u64,
}

#[async_trait]
impl RuntimeClient for HttpRuntimeClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_meta(&self) -> Result<Meta> {
        self.get_json("/meta").await
    }

    async fn health(&self) -> Result<HashMap<String, serde_json::Value>> {
        self.get_json("/health").await
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Resp {
            content: String,
        }
        let resp: Resp = self
            .get_json(&format!("/fs/read?path={}", urlencode(path)))
            .await?;
        Ok(resp.content)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(&format!("/fs/write?path={}", urlencode(path)), &WriteFileBody { content })
            .await?;
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.get_json(&format!("/fs/list?path={}", urlencode(path))).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/fs/delete?path={}", urlencode(path))))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let _: serde_json::Value = decode_json(resp).await?;
        Ok(())
    }

    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/fs/upload?path={}", urlencode(path))))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let _: serde_json::Value = decode_json(resp).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.url(&format!("/fs/download?path={}", urlencode(path))))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::RuntimeError(format!("runtime responded {status}: {body}")));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::RuntimeError(format!("bad response body: {e}")))
    }

    async fn exec_shell(
        &self,
        command: &str,
        timeout_secs: u64,
        cwd: Option<&str>,
    ) -> Result<ExecutionResult> {
        self.post_json("/exec/shell", &ExecShellBody { command, timeout_secs, cwd })
            .await
    }

    async fn exec_python(&self, code: &str, timeout_secs: u64) -> Result<ExecutionResult> {
        self.post_json("/exec/python", &ExecPythonBody { code, timeout_secs })
            .await
    }
}

fn urlencode(s: &str) -> String {
    // The only capability paths this crate forwards have already passed
    // `sandbox_core::path::validate_workspace_path` (no `..`, no leading
    // `/`), so the only characters worth escaping here are `%` and the
    // query-string delimiters.
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '%' => "%25".to_string(),
            '&' => "%26".to_string(),
            '#' => "%23".to_string(),
            '?' => "%3F".to_string(),
            other => other.to_string(),
        })
        .collect()
}

struct CachedClient {
    client: Arc<HttpRuntimeClient>,
    created_at: Instant,
    last_used: Instant,
}

struct CachedMeta {
    meta: Meta,
    fetched_at: Instant,
}

struct PoolInner {
    clients: HashMap<String, CachedClient>,
    metas: HashMap<String, CachedMeta>,
}

/// Process-wide LRU+TTL cache of [`HttpRuntimeClient`]s, keyed by endpoint
/// URL, plus a TTL cache of each endpoint's `/meta`. Shared across request
/// handlers so `/meta` cache hits are realistic (spec §4.3, §9).
pub struct RuntimeClientPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
    client_ttl: Duration,
    meta_ttl: Duration,
}

impl RuntimeClientPool {
    pub fn new(capacity: usize, client_ttl: Duration, meta_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                clients: HashMap::new(),
                metas: HashMap::new(),
            }),
            capacity,
            client_ttl,
            meta_ttl,
        }
    }

    /// Fetch (constructing and evicting as needed) the client bound to
    /// `endpoint`. Construction happens outside the pool mutex.
    pub fn get(&self, endpoint: &str) -> Arc<HttpRuntimeClient> {
        let now = Instant::now();
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.clients.get_mut(endpoint) {
                if now.duration_since(entry.created_at) < self.client_ttl {
                    entry.last_used = now;
                    return Arc::clone(&entry.client);
                }
                inner.clients.remove(endpoint);
                inner.metas.remove(endpoint);
            }
        }

        // Construction outside the lock.
        let client = Arc::new(HttpRuntimeClient::new(endpoint));

        let mut inner = self.inner.lock();
        if inner.clients.len() >= self.capacity && !inner.clients.contains_key(endpoint) {
            if let Some(lru_key) = inner
                .clients
                .iter()
                .min_by_key(|(_, v)| v.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.clients.remove(&lru_key);
                inner.metas.remove(&lru_key);
            }
        }
        inner.clients.insert(
            endpoint.to_string(),
            CachedClient {
                client: Arc::clone(&client),
                created_at: now,
                last_used: now,
            },
        );
        client
    }

    /// Fetch `/meta` for `endpoint`, served from cache within `meta_ttl`;
    /// fetching over the network happens outside the pool mutex.
    pub async fn get_meta(&self, endpoint: &str) -> Result<Meta> {
        let now = Instant::now();
        {
            let inner = self.inner.lock();
            if let Some(cached) = inner.metas.get(endpoint) {
                if now.duration_since(cached.fetched_at) < self.meta_ttl {
                    return Ok(cached.meta.clone());
                }
            }
        }

        let client = self.get(endpoint);
        let meta = client.get_meta().await?;

        let mut inner = self.inner.lock();
        inner.metas.insert(
            endpoint.to_string(),
            CachedMeta {
                meta: meta.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(meta)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RuntimeClientFactory for RuntimeClientPool {
    fn get(&self, endpoint: &str) -> Arc<dyn RuntimeClient> {
        RuntimeClientPool::get(self, endpoint) as Arc<dyn RuntimeClient>
    }

    async fn get_meta(&self, endpoint: &str) -> Result<Meta> {
        RuntimeClientPool::get_meta(self, endpoint).await
    }
}

#[cfg(test)]
#[path = "runtime_http_tests.rs"]
mod tests;
