use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "gridiron_metrics";
const CACHE_FILE: &str = "responses.json";

static CACHE: Mutex<Option<ResponseCache>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ResponseCache {
    version: u32,
    entries: HashMap<String, CachedResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// A request against the upstream API.
pub struct ApiRequest<'a> {
    pub url: &'a str,
    pub bearer: Option<&'a str>,
    /// Serve a cached body younger than this without touching the network.
    pub max_age: Option<Duration>,
}

pub fn fetch_json_cached(client: &Client, req: &ApiRequest<'_>) -> Result<String> {
    let cached = with_cache(|cache| cache.entries.get(req.url).cloned());
    let now = now_secs();

    if let (Some(entry), Some(max_age)) = (cached.as_ref(), req.max_age)
        && now.saturating_sub(entry.fetched_at) <= max_age.as_secs()
    {
        debug!(url = req.url, "serving cached response");
        return Ok(entry.body.clone());
    }

    let mut builder = client.get(req.url).header(ACCEPT, "application/json");
    if let Some(token) = req.bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(entry) = cached.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            builder = builder.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = builder.send().context("request failed")?;
    let status = resp.status();
    let headers = resp.headers().clone();

    if status == StatusCode::NOT_MODIFIED {
        let mut entry = cached.ok_or_else(|| anyhow!("received 304 without cached body"))?;
        entry.fetched_at = now;
        let body = entry.body.clone();
        store(req.url, entry);
        return Ok(body);
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {status} for {}: {}", req.url, truncate(&body, 200)));
    }

    let header_value = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    store(
        req.url,
        CachedResponse {
            body: body.clone(),
            etag: header_value(ETAG),
            last_modified: header_value(LAST_MODIFIED),
            fetched_at: now,
        },
    );
    Ok(body)
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn with_cache<T>(f: impl FnOnce(&mut ResponseCache) -> T) -> T {
    let mut guard = CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let cache = guard.get_or_insert_with(load_cache_file);
    f(cache)
}

fn store(url: &str, entry: CachedResponse) {
    with_cache(|cache| {
        cache.version = CACHE_VERSION;
        cache.entries.insert(url.to_string(), entry);
        if let Err(err) = save_cache_file(cache) {
            debug!(error = %err, "response cache not persisted");
        }
    });
}

fn load_cache_file() -> ResponseCache {
    let Some(path) = cache_path() else {
        return ResponseCache::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return ResponseCache::default();
    };
    let cache = serde_json::from_str::<ResponseCache>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return ResponseCache::default();
    }
    cache
}

fn save_cache_file(cache: &ResponseCache) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize response cache")?;
    fs::write(&tmp, json).context("write response cache")?;
    fs::rename(&tmp, &path).context("swap response cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn truncate(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
