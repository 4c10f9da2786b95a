use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{ChangeFeed, ContextId, KeyValueStore, StorageError, StorageEvents};

const VALUE_EXTENSION: &str = "value";
const STAGING_EXTENSION: &str = "staged";
#[cfg(unix)]
const OWNER_ONLY: u32 = 0o600;

/// Configuration for directory-backed storage.
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    pub base_dir: PathBuf,
}

impl FileStorageConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_storage_dir()
    }
}

/// Directory-backed medium: one file per key, written atomically with
/// owner-only permissions.
///
/// Change notifications reach every context created from the same
/// `FileStorage` value (or its clones). Other processes writing the same
/// directory are visible to reads but do not produce notifications.
///
/// # Example
/// ```no_run
/// use baas_client::storage::{FileStorage, KeyValueStore};
///
/// let storage = FileStorage::new_default();
/// let store = storage.context();
/// store.set("baas-message-bus", r#"{"type":"tokenUpdated"}"#)?;
/// # Ok::<(), baas_client::storage::StorageError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
    feed: ChangeFeed,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Self {
        Self {
            base_dir: config.base_dir,
            feed: ChangeFeed::default(),
        }
    }

    pub fn new_default() -> Self {
        Self::new(FileStorageConfig::new(default_storage_dir()))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Attach a new context to this medium.
    pub fn context(&self) -> FileStore {
        FileStore {
            id: ContextId::new(),
            base_dir: self.base_dir.clone(),
            feed: self.feed.clone(),
        }
    }
}

/// One context of a [`FileStorage`].
#[derive(Debug)]
pub struct FileStore {
    id: ContextId,
    base_dir: PathBuf,
    feed: ChangeFeed,
}

impl FileStore {
    pub fn id(&self) -> ContextId {
        self.id
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self
            .base_dir
            .join(format!("{}.{VALUE_EXTENSION}", encode_key(key))))
    }

    /// Replace the value of `key` in one step: stage a sibling file, flush
    /// it, then rename it over the value. Readers see the old or the new
    /// value, never a partial one.
    fn write_value(&self, key: &str, path: &Path, value: &str) -> Result<(), StorageError> {
        let staged = path.with_extension(format!("{}.{STAGING_EXTENSION}", Uuid::new_v4().simple()));
        let failed = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.base_dir).map_err(failed)?;
        if let Err(err) = stage(&staged, value.as_bytes()).and_then(|()| fs::rename(&staged, path)) {
            // The staged file may not exist.
            let _ = fs::remove_file(&staged);
            return Err(failed(err));
        }
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(OWNER_ONLY)).map_err(failed)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::read(&self.value_path(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;
        let old = Self::read(&path)?;
        self.write_value(key, &path, value)?;
        self.feed.publish(self.id, key, old, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;
        let old = Self::read(&path)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(StorageError::Io(err)),
        }
        self.feed.publish(self.id, key, old, None);
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        self.feed.subscribe(self.id)
    }
}

fn default_storage_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "baas", "baas-client")
        .map(|dirs| dirs.data_dir().join("storage"))
        .unwrap_or_else(|| PathBuf::from(".baas"))
}

/// Map a key to a file stem. Unreserved characters pass through, everything
/// else is percent-encoded, so distinct keys never collide.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn stage(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(OWNER_ONLY);
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
