//! Translation of bioconda dependency identifiers into nixpkgs attributes.
//!
//! The tables are versioned configuration data, not code: the defaults ship
//! embedded in the binary and a different revision can be loaded from disk
//! with `--tables`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use camino::Utf8Path;
use serde::Deserialize;

use crate::error::TablesError;

static BUILTIN: LazyLock<Tables> = LazyLock::new(|| {
    serde_yaml::from_str(include_str!("../data/tables.yaml"))
        .expect("embedded table data must parse")
});

/// Outcome of resolving a single dependency identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Implicit in the Nix build environment; dropped from dependency lists.
    Suppressed,
    /// Mapped to an explicit nixpkgs attribute.
    Renamed(&'a str),
    /// Passes through under the same name.
    Available(&'a str),
    /// Not present in any table; the caller classifies this.
    Unknown,
}

impl<'a> Resolution<'a> {
    /// The nixpkgs attribute, when there is one.
    pub fn name(self) -> Option<&'a str> {
        match self {
            Resolution::Renamed(name) | Resolution::Available(name) => Some(name),
            Resolution::Suppressed | Resolution::Unknown => None,
        }
    }
}

/// The three translation tables, loaded once per run.
#[derive(Debug, Clone, Deserialize)]
pub struct Tables {
    pub version: u32,
    #[serde(default)]
    renamed: HashMap<String, String>,
    #[serde(default)]
    available: HashSet<String>,
    #[serde(default)]
    suppressed: HashSet<String>,
}

impl Tables {
    /// The table revision embedded at build time.
    pub fn builtin() -> &'static Tables {
        &BUILTIN
    }

    /// Loads an alternate table revision from a YAML file.
    pub fn from_path(path: &Utf8Path) -> Result<Tables, TablesError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Resolves one bare identifier. Suppression wins over renaming, and
    /// renaming wins over plain availability; an identifier in both the
    /// renamed table and the available set is renamed.
    pub fn resolve<'a>(&'a self, name: &'a str) -> Resolution<'a> {
        if self.suppressed.contains(name) {
            Resolution::Suppressed
        } else if let Some(target) = self.renamed.get(name) {
            Resolution::Renamed(target)
        } else if self.available.contains(name) {
            Resolution::Available(name)
        } else {
            Resolution::Unknown
        }
    }
}

/// Strips the version qualifier from a requirement entry, leaving the bare
/// package token. Recognizes all six comparison operators and bare
/// space-separated version suffixes.
pub fn strip_version(requirement: &str) -> &str {
    let requirement = requirement.trim();

    match requirement.find([' ', '<', '>', '=', '!']) {
        Some(end) => &requirement[..end],
        None => requirement,
    }
}
