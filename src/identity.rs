//! Player display name: validation and persistence between sessions.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Key the name is stored under.
pub const PLAYER_NAME_KEY: &str = "playerName";

pub const MAX_NAME_CHARS: usize = 24;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} '\-]*$").expect("valid name regex"));

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("a name is required")]
    Empty,
    #[error("names are limited to {} characters", MAX_NAME_CHARS)]
    TooLong,
    #[error("names may only contain letters, digits, spaces, apostrophes and hyphens")]
    InvalidCharacters,
    #[error("failed to access name store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("name store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Trim and check a name typed by the player.
pub fn validate_name(raw: &str) -> Result<String, IdentityError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(IdentityError::Empty);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(IdentityError::TooLong);
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(IdentityError::InvalidCharacters);
    }
    Ok(name.to_string())
}

/// Somewhere to keep the player's name between runs.
pub trait NameStore {
    fn load(&self) -> Result<Option<String>, IdentityError>;
    fn save(&mut self, name: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Default)]
pub struct MemoryNameStore {
    name: Option<String>,
}

impl MemoryNameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl NameStore for MemoryNameStore {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        Ok(self.name.clone())
    }

    fn save(&mut self, name: &str) -> Result<(), IdentityError> {
        self.name = Some(name.to_string());
        Ok(())
    }
}

/// JSON object on disk. Other keys in the file are preserved on save.
#[derive(Debug, Clone)]
pub struct FileNameStore {
    path: PathBuf,
}

impl FileNameStore {
    pub const FILE_NAME: &'static str = "profile.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>, IdentityError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(IdentityError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| IdentityError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl NameStore for FileNameStore {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        let name = match self.read_entries()?.remove(PLAYER_NAME_KEY) {
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                warn!("Ignoring non-text {PLAYER_NAME_KEY} in {}: {other}", self.path.display());
                None
            }
            None => None,
        };
        debug!("Loaded saved name from {}: {name:?}", self.path.display());
        Ok(name.filter(|n| !n.is_empty()))
    }

    fn save(&mut self, name: &str) -> Result<(), IdentityError> {
        let io_err = |source: std::io::Error| IdentityError::Io {
            path: self.path.clone(),
            source,
        };
        let mut entries = self.read_entries()?;
        entries.insert(PLAYER_NAME_KEY.to_string(), Value::from(name));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&entries).map_err(|source| {
            IdentityError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        info!("Saved player name to {}", self.path.display());
        Ok(())
    }
}
