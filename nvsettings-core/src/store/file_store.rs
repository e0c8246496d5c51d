//! File-based store backend
//!
//! Layout under the data directory:
//! ```text
//! FORMAT             [Magic: 4 bytes "NVSF"][Version: 1 byte]
//! <namespace>.nvs    [Magic: 4 bytes "NVSN"][Version: 1 byte][Count: u32 LE]
//!                    Count x [KeyLen: u8][Key][Kind tag: u8][Payload: u64 LE]
//!                    [CRC32 of everything before: u32 LE]
//! ```
//! Writes are staged in the session. `commit` re-reads the namespace file
//! under the store's commit lock, applies the staged keys on top and writes
//! the result to a synced temporary file renamed over the namespace file, so
//! overlapping sessions only replace the keys they wrote.

use super::{
    validate_key, validate_namespace, ScalarKind, ScalarValue, StoreBackend, StoreError,
    StoreResult, StoreSession,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Magic header for the format marker file
const FORMAT_MAGIC: &[u8; 4] = b"NVSF";

/// Magic header for namespace files
const NAMESPACE_MAGIC: &[u8; 4] = b"NVSN";

/// Current on-disk format version
pub const FORMAT_VERSION: u8 = 1;

/// Name of the format marker file
const FORMAT_FILE: &str = "FORMAT";

/// Extension of namespace files
const NAMESPACE_EXT: &str = "nvs";

/// Header size: magic(4) + version(1) + count(4)
const HEADER_SIZE: usize = 4 + 1 + 4;

/// Default number of keys a namespace may hold
pub const DEFAULT_MAX_ENTRIES: usize = 126;

/// File-backed store rooted at a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    max_entries: usize,
    initialized: Arc<AtomicBool>,
    commit_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Create a file store at the given path (nothing is touched until `init`)
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
            initialized: Arc::new(AtomicBool::new(false)),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Limit the number of keys per namespace
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn format_path(&self) -> PathBuf {
        self.base_path.join(FORMAT_FILE)
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", namespace, NAMESPACE_EXT))
    }
}

impl StoreBackend for FileStore {
    fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base_path)?;

        let marker = self.format_path();
        if marker.exists() {
            let data = fs::read(&marker)?;
            if data.len() != FORMAT_MAGIC.len() + 1 || &data[0..4] != FORMAT_MAGIC {
                return Err(StoreError::Corrupted(format!(
                    "invalid format marker in {}",
                    self.base_path.display()
                )));
            }
            let found = data[4];
            if found != FORMAT_VERSION {
                return Err(StoreError::NewVersionFound {
                    found,
                    expected: FORMAT_VERSION,
                });
            }
        } else {
            let mut data = Vec::with_capacity(FORMAT_MAGIC.len() + 1);
            data.extend_from_slice(FORMAT_MAGIC);
            data.push(FORMAT_VERSION);
            write_atomic(&marker, &data)?;
            debug!(path = %self.base_path.display(), "created settings store");
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn erase(&self) -> StoreResult<()> {
        self.initialized.store(false, Ordering::Release);
        if !self.base_path.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            let is_namespace = path
                .extension()
                .is_some_and(|ext| ext == NAMESPACE_EXT || ext == "tmp");
            let is_marker = path.file_name().is_some_and(|name| name == FORMAT_FILE);
            if is_namespace || is_marker {
                fs::remove_file(&path)?;
            }
        }
        debug!(path = %self.base_path.display(), "erased settings store");
        Ok(())
    }

    fn open(&self, namespace: &str) -> StoreResult<Box<dyn StoreSession>> {
        validate_namespace(namespace)?;
        if !self.initialized.load(Ordering::Acquire) {
            return Err(StoreError::NotInitialized);
        }

        let path = self.namespace_path(namespace);
        let committed = read_entries(&path, namespace)?;

        Ok(Box::new(FileSession {
            namespace: namespace.to_string(),
            path,
            committed,
            staged: BTreeMap::new(),
            max_entries: self.max_entries,
            commit_lock: Arc::clone(&self.commit_lock),
        }))
    }
}

/// Session over one namespace file
struct FileSession {
    namespace: String,
    path: PathBuf,
    /// Namespace contents as of open or the last commit
    committed: BTreeMap<String, ScalarValue>,
    staged: BTreeMap<String, ScalarValue>,
    max_entries: usize,
    commit_lock: Arc<Mutex<()>>,
}

impl StoreSession for FileSession {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn read(&mut self, key: &str, kind: ScalarKind) -> StoreResult<ScalarValue> {
        validate_key(key)?;
        match self.staged.get(key).or_else(|| self.committed.get(key)) {
            Some(value) if value.kind() == kind => Ok(*value),
            Some(value) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: kind,
                found: value.kind(),
            }),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn write(&mut self, key: &str, value: ScalarValue) -> StoreResult<()> {
        validate_key(key)?;
        let known = self.staged.contains_key(key) || self.committed.contains_key(key);
        if !known && self.entry_count() >= self.max_entries {
            return Err(StoreError::NoSpace(self.namespace.clone()));
        }
        self.staged.insert(key.to_string(), value);
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let _guard = self.commit_lock.lock();
        let mut entries = read_entries(&self.path, &self.namespace)?;
        let added = self
            .staged
            .keys()
            .filter(|key| !entries.contains_key(*key))
            .count();
        if entries.len() + added > self.max_entries {
            return Err(StoreError::NoSpace(self.namespace.clone()));
        }

        entries.extend(self.staged.iter().map(|(k, v)| (k.clone(), *v)));
        write_atomic(&self.path, &encode_namespace(&entries))?;
        self.staged.clear();
        self.committed = entries;
        Ok(())
    }

    fn close(&mut self) {
        self.staged.clear();
        self.committed.clear();
    }
}

impl FileSession {
    fn entry_count(&self) -> usize {
        let new_keys = self
            .staged
            .keys()
            .filter(|key| !self.committed.contains_key(*key))
            .count();
        self.committed.len() + new_keys
    }
}

/// Read a namespace file; a missing file is empty, an unreadable one is discarded
fn read_entries(path: &Path, namespace: &str) -> StoreResult<BTreeMap<String, ScalarValue>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = fs::read(path)?;
    match decode_namespace(&data) {
        Ok(entries) => Ok(entries),
        Err(err) => {
            warn!(namespace, error = %err, "discarding unreadable namespace file");
            Ok(BTreeMap::new())
        }
    }
}

/// Write file atomically (write to temp, then rename)
fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    sync_parent_dir(path)
}

/// Make a completed rename durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> StoreResult<()> {
    Ok(())
}

fn encode_namespace(entries: &BTreeMap<String, ScalarValue>) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER_SIZE + entries.len() * 24 + 4);
    data.extend_from_slice(NAMESPACE_MAGIC);
    data.push(FORMAT_VERSION);
    data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (key, value) in entries {
        // Keys are validated to MAX_KEY_LEN on write
        data.push(key.len() as u8);
        data.extend_from_slice(key.as_bytes());
        data.push(value.kind().tag());
        data.extend_from_slice(&value.to_bits().to_le_bytes());
    }
    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    data
}

fn decode_namespace(data: &[u8]) -> StoreResult<BTreeMap<String, ScalarValue>> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(StoreError::Corrupted("namespace file too short".to_string()));
    }

    let (body, crc_bytes) = data.split_at(data.len() - 4);
    let expected_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32fast::hash(body) != expected_crc {
        return Err(StoreError::Corrupted("checksum mismatch".to_string()));
    }
    if &body[0..4] != NAMESPACE_MAGIC {
        return Err(StoreError::Corrupted("invalid magic header".to_string()));
    }
    if body[4] != FORMAT_VERSION {
        return Err(StoreError::NewVersionFound {
            found: body[4],
            expected: FORMAT_VERSION,
        });
    }

    let count = u32::from_le_bytes([body[5], body[6], body[7], body[8]]) as usize;
    let mut cursor = &body[HEADER_SIZE..];
    let mut entries = BTreeMap::new();

    for _ in 0..count {
        let (&key_len, rest) = cursor
            .split_first()
            .ok_or_else(|| StoreError::Corrupted("truncated entry".to_string()))?;
        let key_len = key_len as usize;
        if rest.len() < key_len + 1 + 8 {
            return Err(StoreError::Corrupted("truncated entry".to_string()));
        }

        let key = std::str::from_utf8(&rest[..key_len])
            .map_err(|_| StoreError::Corrupted("key is not UTF-8".to_string()))?;
        let tag = rest[key_len];
        let kind = ScalarKind::from_tag(tag)
            .ok_or_else(|| StoreError::Corrupted(format!("unknown kind tag {:#04x}", tag)))?;

        let mut payload = [0u8; 8];
        payload.copy_from_slice(&rest[key_len + 1..key_len + 9]);
        let value = ScalarValue::from_bits(kind, u64::from_le_bytes(payload)).ok_or_else(|| {
            StoreError::Corrupted(format!("payload out of range for {} '{}'", kind, key))
        })?;

        entries.insert(key.to_string(), value);
        cursor = &rest[key_len + 9..];
    }

    if !cursor.is_empty() {
        return Err(StoreError::Corrupted("trailing bytes".to_string()));
    }
    Ok(entries)
}
