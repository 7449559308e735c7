//! Format detection, file discovery and deserialization helpers.

use std::path::{Path, PathBuf};

use brachisto_core::registry::RegistryError;
use brachisto_tech_tree::TechTreeError;
use serde::de::DeserializeOwned;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("invalid static data: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid research tree: {0}")]
    TechTree(#[from] TechTreeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const EXTENSIONS: [&'static str; 3] = ["ron", "toml", "json"];
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron|toml|json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `ConflictingFormats` if more than
/// one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in Format::EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so TOML files hold the
/// list under `toml_key` (`[[zones]]`); RON and JSON files are the list.
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .cloned()
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
            array.try_into().map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
