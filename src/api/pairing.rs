//! Persisted device pairing

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;

/// File name of the pairing blob inside the user data directory
pub const PAIR_FILE: &str = "pairinfo";

/// Storage for the last successful pairing response.
pub trait PairStore: Send + Sync {
    /// Whole blob, `None` when nothing was stored yet
    fn read(&self) -> Option<String>;
    /// Replace the blob
    fn write(&self, content: &str) -> io::Result<()>;
}

/// Pairing blob stored as a file (truncated on every write)
pub struct FilePairStore {
    path: PathBuf,
}

impl FilePairStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store in the default per-user data directory
    pub fn in_user_dir() -> Self {
        Self::new(crate::config::user_data_dir().join(PAIR_FILE))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl PairStore for FilePairStore {
    fn read(&self) -> Option<String> {
        log::debug!("Opening file {}", self.path.display());
        fs::read_to_string(&self.path).ok()
    }

    fn write(&self, content: &str) -> io::Result<()> {
        fs::write(&self.path, content)
    }
}

/// Pairing response as persisted: the raw `create-pairing` answer plus the
/// owning user name and device serial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRecord {
    #[serde(default)]
    pub status: i64,
    #[serde(default, deserialize_with = "lenient_id")]
    pub device_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub serial: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PairingRecord {
    pub fn parse(content: &str) -> Option<Self> {
        match serde_json::from_str(content) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Stored pairing is not valid JSON: {}", e);
                None
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 1
    }

    pub fn has_device(&self) -> bool {
        !self.device_id.is_empty() && !self.password.is_empty()
    }

    /// Whether this pairing may be reused for `user_name` on the device `serial`
    pub fn matches(&self, user_name: &str, serial: &str) -> bool {
        self.is_success() && self.user_name == user_name && self.serial == serial
    }
}

/// Device ids come back as numbers, older blobs may hold strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) if n.as_i64() == Some(0) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        _ => String::new(),
    })
}
