//! Persistence for the identity record: a durable key-value store plus a
//! cookie mirror a server can read.
//!
//! ## Design Principles
//!
//! - **Best-effort**: [`RecordStore::load`] and [`RecordStore::save`] never fail.
//!   Read errors and corrupt JSON read as "no record"; write errors are logged.
//! - **Independent mirror**: a cookie failure never blocks the local write.
//! - **Pluggable backends**: [`KeyValueStore`] and [`CookieJar`] are traits, with
//!   in-memory backends for tests and file backends for the CLI.
//!
//! # Atomic Writes
//!
//! [`FileStore`] and [`FileCookieJar`] write through temp file + rename so a
//! crash mid-write never leaves a truncated record behind.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::DateTime;
use fs_err as fs;
use footprint_protocol::CookiePayload;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::STORAGE_KEY;
use crate::error::{FootprintError, Result};
use crate::types::IdentityRecord;

/// Characters left as-is by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// ═══════════════════════════════════════════════════════════════════════════════
// Backend Traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Durable string key-value storage (localStorage-like).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Cookie storage visible to HTTP requests.
pub trait CookieJar: Send + Sync {
    fn set_cookie(&self, cookie: Cookie) -> Result<()>;
    fn get_cookie(&self, name: &str) -> Result<Option<Cookie>>;
}

/// A cookie as the tracker writes it. `value` is stored unencoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires_ms: Option<i64>,
    pub path: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, expires_ms: Option<i64>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires_ms,
            path: "/".to_string(),
        }
    }

    /// Renders the `document.cookie` / `Set-Cookie` form:
    /// `name=<encoded value>; expires=<HTTP-date>; path=/`.
    pub fn to_header(&self) -> String {
        let mut header = format!(
            "{}={}",
            self.name,
            utf8_percent_encode(&self.value, URI_COMPONENT)
        );
        if let Some(expires) = self.expires_ms.and_then(http_date) {
            header.push_str("; expires=");
            header.push_str(&expires);
        }
        header.push_str("; path=");
        header.push_str(&self.path);
        header
    }
}

fn http_date(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Record Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Loads and saves the single identity record, mirroring ids into a cookie.
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieJar>,
    cookie_name: String,
}

impl RecordStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cookies,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Reads the persisted record, surfacing why it could not be read.
    pub fn try_load(&self) -> Result<Option<IdentityRecord>> {
        let content = match self.store.get(STORAGE_KEY)? {
            Some(content) => content,
            None => return Ok(None),
        };

        if content.trim().is_empty() || content.trim() == "null" {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| FootprintError::Json {
                context: format!("parsing {}", STORAGE_KEY),
                source,
            })
    }

    /// Best-effort load: any failure reads as "no record".
    pub fn load(&self) -> Option<IdentityRecord> {
        match self.try_load() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load identity record; starting fresh");
                None
            }
        }
    }

    /// Best-effort save: writes the record, then the cookie mirror.
    pub fn save(&self, record: &IdentityRecord) {
        if let Err(e) = self.write_record(record) {
            tracing::warn!(error = %e, "Failed to persist identity record");
        }
        if let Err(e) = self.write_cookie(record) {
            tracing::warn!(error = %e, cookie = %self.cookie_name, "Failed to set identity cookie");
        }
    }

    fn write_record(&self, record: &IdentityRecord) -> Result<()> {
        let content = serde_json::to_string(record).map_err(|source| FootprintError::Json {
            context: format!("serializing {}", STORAGE_KEY),
            source,
        })?;
        self.store.set(STORAGE_KEY, &content)
    }

    fn write_cookie(&self, record: &IdentityRecord) -> Result<()> {
        let payload = CookiePayload {
            user_id: record.id.clone(),
            visit_id: record.visit_id().unwrap_or_default().to_string(),
        };
        let value = serde_json::to_string(&payload).map_err(|source| FootprintError::Json {
            context: "serializing cookie payload".to_string(),
            source,
        })?;
        self.cookies.set_cookie(Cookie::new(
            self.cookie_name.clone(),
            value,
            Some(record.expiration_date),
        ))
    }

    /// Reads back the ids mirrored into the cookie, if present and parseable.
    pub fn cookie_payload(&self) -> Option<CookiePayload> {
        let cookie = self.cookies.get_cookie(&self.cookie_name).ok().flatten()?;
        serde_json::from_str(&cookie.value).ok()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backends
// ═══════════════════════════════════════════════════════════════════════════════

/// In-process [`KeyValueStore`]. Can be switched into a failing mode to mimic
/// a disabled or full browser store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Writes raw content, bypassing the unavailable flag (for seeding tests).
    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FootprintError::StorageUnavailable(
                "memory store disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.put_raw(key, value);
        Ok(())
    }
}

/// In-process [`CookieJar`].
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, Cookie>>,
    unavailable: AtomicBool,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl CookieJar for MemoryCookieJar {
    fn set_cookie(&self, cookie: Cookie) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FootprintError::StorageUnavailable(
                "cookies disabled".to_string(),
            ));
        }
        self.cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self
            .cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File Backends
// ═══════════════════════════════════════════════════════════════════════════════

/// [`KeyValueStore`] keeping one `<key>.json` file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FootprintError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        write_atomic(&self.root, &self.path_for(key), value)
    }
}

/// [`CookieJar`] persisted as a JSON map of cookie name → cookie.
#[derive(Debug, Clone)]
pub struct FileCookieJar {
    path: PathBuf,
}

impl FileCookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> BTreeMap<String, Cookie> {
        // Corrupt jar → empty jar; it is rewritten on the next save
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

impl CookieJar for FileCookieJar {
    fn set_cookie(&self, cookie: Cookie) -> Result<()> {
        let mut cookies = self.read_all();
        cookies.insert(cookie.name.clone(), cookie);
        let content =
            serde_json::to_string_pretty(&cookies).map_err(|source| FootprintError::Json {
                context: "serializing cookie jar".to_string(),
                source,
            })?;
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        write_atomic(&parent, &self.path, &content)
    }

    fn get_cookie(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self.read_all().remove(name))
    }
}

fn write_atomic(dir: &Path, path: &Path, content: &str) -> Result<()> {
    let io_err = |source: std::io::Error| FootprintError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut temp_file = NamedTempFile::new_in(dir).map_err(io_err)?;
    temp_file.write_all(content.as_bytes()).map_err(io_err)?;
    temp_file.flush().map_err(io_err)?;
    temp_file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceMap, VisitRecord};
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn sample_record() -> IdentityRecord {
        let mut source = SourceMap::new();
        source.insert("utm_source".to_string(), "news".to_string());
        let mut custom_data = Map::new();
        custom_data.insert("tier".to_string(), json!("gold"));
        IdentityRecord {
            id: "user-1".to_string(),
            expiration_date: 1_700_000_000_000,
            last_activity: 1_600_000_000_000,
            landing_page: "https://shop.example/?utm_source=news".to_string(),
            source: source.clone(),
            custom_data,
            visit: Some(VisitRecord {
                id: "visit-1".to_string(),
                expiration_date: 1_600_000_900_000,
                landing_page: "https://shop.example/?utm_source=news".to_string(),
                source,
                count: 3,
                is_engaged: true,
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    fn memory_store() -> (Arc<MemoryStore>, Arc<MemoryCookieJar>, RecordStore) {
        let kv = Arc::new(MemoryStore::new());
        let jar = Arc::new(MemoryCookieJar::new());
        let store = RecordStore::new(kv.clone(), jar.clone(), "uv_ids");
        (kv, jar, store)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Record Store
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_save_then_load_round_trips() {
        let (_, _, store) = memory_store();
        let record = sample_record();
        store.save(&record);
        assert_eq!(store.load(), Some(record));
    }

    #[test]
    fn test_load_empty_store() {
        let (_, _, store) = memory_store();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_corrupt_json_reads_as_absent() {
        let (kv, _, store) = memory_store();
        kv.put_raw(STORAGE_KEY, "{not json");
        assert!(store.try_load().is_err());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_null_and_blank_read_as_absent() {
        let (kv, _, store) = memory_store();
        kv.put_raw(STORAGE_KEY, "null");
        assert_eq!(store.load(), None);
        kv.put_raw(STORAGE_KEY, "   ");
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_unavailable_store_is_swallowed() {
        let (kv, jar, store) = memory_store();
        kv.set_unavailable(true);
        store.save(&sample_record());
        assert_eq!(store.load(), None);

        // Cookie mirror still written when the local write fails
        let cookie = jar.get_cookie("uv_ids").unwrap().unwrap();
        assert!(cookie.value.contains("user-1"));
    }

    #[test]
    fn test_cookie_failure_does_not_block_local_write() {
        let (_, jar, store) = memory_store();
        jar.set_unavailable(true);
        let record = sample_record();
        store.save(&record);
        assert_eq!(store.load(), Some(record));
        assert!(store.cookie_payload().is_none());
    }

    #[test]
    fn test_cookie_mirrors_ids_and_expiry() {
        let (_, jar, store) = memory_store();
        store.save(&sample_record());

        let payload = store.cookie_payload().unwrap();
        assert_eq!(payload.user_id, "user-1");
        assert_eq!(payload.visit_id, "visit-1");

        let cookie = jar.get_cookie("uv_ids").unwrap().unwrap();
        assert_eq!(cookie.expires_ms, Some(1_700_000_000_000));
        assert_eq!(cookie.path, "/");
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cookie Rendering
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_cookie_header_encodes_like_uri_component() {
        let cookie = Cookie::new("uv_ids", r#"{"userId":"a b"}"#, Some(0));
        assert_eq!(
            cookie.to_header(),
            "uv_ids=%7B%22userId%22%3A%22a%20b%22%7D; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/"
        );
    }

    #[test]
    fn test_cookie_header_without_expiry() {
        let cookie = Cookie::new("x", "v-1_(ok)", None);
        assert_eq!(cookie.to_header(), "x=v-1_(ok); path=/");
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // File Backends
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let kv = Arc::new(FileStore::new(temp.path().join("data")));
        let jar = Arc::new(FileCookieJar::new(temp.path().join("data").join("cookies.json")));
        let store = RecordStore::new(kv.clone(), jar, "uv_ids");

        let record = sample_record();
        store.save(&record);
        assert!(kv.path_for(STORAGE_KEY).exists());
        assert_eq!(store.load(), Some(record));
        assert_eq!(store.cookie_payload().unwrap().visit_id, "visit-1");
    }

    #[test]
    fn test_file_store_missing_and_overwrite() {
        let temp = TempDir::new().unwrap();
        let kv = FileStore::new(temp.path());
        assert_eq!(kv.get("nothing").unwrap(), None);
        kv.set("k", "v").unwrap();
        kv.set("k", "w").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn test_file_cookie_jar_survives_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cookies.json");
        fs::write(&path, "garbage").unwrap();
        let jar = FileCookieJar::new(&path);
        assert_eq!(jar.get_cookie("uv_ids").unwrap(), None);
        jar.set_cookie(Cookie::new("uv_ids", "v", None)).unwrap();
        assert_eq!(jar.get_cookie("uv_ids").unwrap().unwrap().value, "v");
    }
}
