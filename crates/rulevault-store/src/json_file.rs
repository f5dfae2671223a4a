//! Atomic single-document JSON file I/O.
//!
//! Every persisted artifact (version file, active snapshot, index, backup
//! bundle) is one pretty-printed JSON document. Writes go temp → flush →
//! fsync → rename → parent-dir sync, so a crash never leaves a half-written
//! file where a reader can see it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from single-document JSON I/O.
#[derive(Debug, thiserror::Error)]
pub enum JsonFileError {
    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("{path}: parse error: {message}")]
    Parse { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted record: {0}")]
    Corrupt(String),
}

impl JsonFileError {
    fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Read and decode one JSON document.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, JsonFileError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| JsonFileError::io(path, e))?;
    validate_payload_bytes(path, &bytes)?;
    serde_json::from_slice(&bytes).map_err(|e| JsonFileError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Encode and atomically persist one JSON document.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), JsonFileError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| JsonFileError::io(parent, e))?;
    }

    let encoded =
        serde_json::to_vec_pretty(value).map_err(|e| JsonFileError::Serialize(e.to_string()))?;

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), JsonFileError> {
        let file = File::create(&tmp_path).map_err(|e| JsonFileError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&encoded)
            .map_err(|e| JsonFileError::io(&tmp_path, e))?;
        writer
            .flush()
            .map_err(|e| JsonFileError::io(&tmp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| JsonFileError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| JsonFileError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        JsonFileError::Io {
            path: format!("{} -> {}", tmp_path.display(), path.display()),
            message: e.to_string(),
        }
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| JsonFileError::io(parent, e))?;
        dir.sync_all().map_err(|e| JsonFileError::io(parent, e))?;
    }

    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_payload_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonFileError> {
    if bytes.contains(&0) {
        return Err(JsonFileError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonFileError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}
