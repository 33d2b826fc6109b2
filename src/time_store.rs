use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timer::format_time;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize time store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("time key must not be empty")]
    EmptyKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredTime {
    seconds: f64,
    #[serde(rename = "updatedAt", alias = "updated_at")]
    updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TimeStoreFile {
    version: u8,
    entries: HashMap<String, StoredTime>,
}

#[derive(Clone, Debug, Deserialize)]
struct TimeStoreFileRaw {
    version: u8,
    entries: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BestTimeResponse {
    pub key: String,
    pub seconds: Option<f64>,
    pub formatted: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
}

/// Named float values persisted as JSON, one file per store.
pub struct TimeStore {
    file_path: PathBuf,
    entries: HashMap<String, StoredTime>,
}

impl TimeStore {
    pub fn new(file_path: PathBuf) -> Self {
        let entries = load_entries(&file_path);
        Self {
            file_path,
            entries,
        }
    }

    /// Stored value for `key`, 0.0 when nothing was saved.
    pub fn load_time(&self, key: &str) -> f32 {
        self.entries
            .get(&time_key(key))
            .map_or(0.0, |entry| entry.seconds as f32)
    }

    pub fn save_time(&mut self, key: &str, seconds: f32) -> Result<(), StoreError> {
        let key = time_key(key);
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        self.entries.insert(
            key,
            StoredTime {
                seconds: seconds.max(0.0) as f64,
                updated_at: now_iso(),
            },
        );
        self.save()
    }

    /// Keeps the lower of the stored and the new time. Returns whether the
    /// new time was written.
    pub fn record_best(&mut self, key: &str, seconds: f32) -> Result<bool, StoreError> {
        let improved = self
            .entries
            .get(&time_key(key))
            .is_none_or(|entry| (seconds as f64) < entry.seconds);
        if improved {
            self.save_time(key, seconds)?;
        }
        Ok(improved)
    }

    pub fn build_response(&self, key: &str) -> BestTimeResponse {
        let key = time_key(key);
        let entry = self.entries.get(&key);
        BestTimeResponse {
            seconds: entry.map(|entry| entry.seconds),
            formatted: entry.map(|entry| format_time(entry.seconds as f32)),
            updated_at: entry.map(|entry| entry.updated_at.clone()),
            key,
            generated_at_iso: now_iso(),
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let payload = TimeStoreFile {
            version: 1,
            entries: self.entries.clone(),
        };
        let text = serde_json::to_string_pretty(&payload)?;
        fs::write(&self.file_path, text).map_err(|source| StoreError::Io {
            path: self.file_path.display().to_string(),
            source,
        })
    }
}

fn load_entries(path: &Path) -> HashMap<String, StoredTime> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[time-store] failed to read {}: {error}", path.display());
            }
            return HashMap::new();
        }
    };
    let parsed = match serde_json::from_str::<TimeStoreFileRaw>(&text) {
        Ok(value) if value.version == 1 => value,
        Ok(value) => {
            eprintln!(
                "[time-store] unsupported version {} at {}",
                value.version,
                path.display()
            );
            return HashMap::new();
        }
        Err(error) => {
            eprintln!("[time-store] failed to parse {}: {error}", path.display());
            return HashMap::new();
        }
    };

    let mut sanitized = HashMap::new();
    for (raw_key, raw_value) in parsed.entries {
        let value: StoredTime = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                eprintln!(
                    "[time-store] failed to parse entry '{}' in {}: {error}",
                    raw_key,
                    path.display()
                );
                continue;
            }
        };
        let key = time_key(&raw_key);
        if key.is_empty() || !value.seconds.is_finite() || value.seconds < 0.0 {
            continue;
        }
        sanitized.insert(key, value);
    }
    sanitized
}

fn time_key(key: &str) -> String {
    key.trim().to_string()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
