//! Roster of known attendee names.
//!
//! The roster is a set of names persisted as a pretty-printed JSON array.
//! On-disk order is insertion order and carries no meaning; every view handed
//! to the operator is sorted at render time.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Names written when no roster file exists yet.
pub const DEFAULT_NAMES: &[&str] = &[
    "John Doe",
    "Jane Smith",
    "Bob Johnson",
    "Alice Williams",
    "Charlie Brown",
    "Diana Prince",
    "Edward Norton",
    "Fiona Apple",
];

/// Trim a candidate attendee name, rejecting blank input.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the name is empty after trimming.
pub fn normalize_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("please enter a name"));
    }
    Ok(trimmed)
}

/// Case-insensitive ordering that keeps distinct casings in a stable order.
fn display_order(a: &String, b: &String) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// File-backed set of known attendee names.
#[derive(Debug)]
pub struct Roster {
    path: PathBuf,
    names: Vec<String>,
}

impl Roster {
    /// Load the roster, creating it with [`DEFAULT_NAMES`] if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is not a JSON array of strings,
    /// or if the default roster cannot be written.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            return Self::read(path);
        }

        info!("No roster at {}, writing defaults", path.display());
        let roster = Self {
            path,
            names: DEFAULT_NAMES.iter().map(ToString::to_string).collect(),
        };
        roster.save()?;
        Ok(roster)
    }

    /// Load an existing roster without creating one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RosterMissing`] if the file does not exist, or a parse
    /// error if it is malformed.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::RosterMissing { path });
        }
        Self::read(path)
    }

    fn read(path: PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(&path)?;
        let names: Vec<String> = serde_json::from_str(&raw)
            .map_err(|source| Error::RosterParse {
                path: path.clone(),
                source,
            })?;
        debug!(count = names.len(), "Loaded roster from {}", path.display());
        Ok(Self { path, names })
    }

    /// Rewrite the whole roster file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut json = serde_json::to_string_pretty(&self.names)?;
        json.push('\n');
        std::fs::write(&self.path, json)?;
        debug!(count = self.names.len(), "Saved roster to {}", self.path.display());
        Ok(())
    }

    /// Get the path to the roster file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a name unless an identical one is already present, then persist.
    ///
    /// Matching is exact and case-sensitive after trimming. Returns `true` if
    /// the name was new.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank names, or a storage error if the
    /// roster cannot be written.
    pub fn add(&mut self, name: &str) -> Result<bool> {
        let name = normalize_name(name)?;
        let added = !self.contains(name);
        if added {
            self.names.push(name.to_string());
            info!(name, "Added name to roster");
        }
        self.save()?;
        Ok(added)
    }

    /// Check whether the exact name is in the roster.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Names in persisted order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All names, sorted for display.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        self.filter("")
    }

    /// Sorted names containing `substring`, ignoring case.
    ///
    /// An empty substring returns the full sorted roster.
    #[must_use]
    pub fn filter(&self, substring: &str) -> Vec<String> {
        let needle = substring.to_lowercase();
        let mut matches: Vec<String> = self
            .names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(display_order);
        matches
    }

    /// Number of names in the roster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the roster has no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
