//! Immutable message catalog.
//!
//! Provides the read-only message store shared by every connection:
//! - Loading from a text source (declared count line, then one message per line)
//! - 1-based lookup by index
//! - Uniform random selection
//!
//! The catalog is built once before the listener starts and is never
//! mutated afterwards, so concurrent readers need no locking.

use rand::Rng;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Catalog loading errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open catalog '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read catalog: {0}")]
    Read(#[from] io::Error),
    #[error("catalog source has no declared count line")]
    MissingCount,
    #[error("invalid declared message count {0:?}")]
    InvalidCount(String),
    #[error("catalog contains no messages")]
    Empty,
}

/// Ordered, read-only collection of servable messages.
#[derive(Debug)]
pub struct Catalog {
    messages: Vec<String>,
}

impl Catalog {
    /// Build a catalog from an in-memory list.
    pub fn from_messages(messages: Vec<String>) -> Result<Self, CatalogError> {
        if messages.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { messages })
    }

    /// Load a catalog from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), size = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog source.
    ///
    /// The first line holds the declared message count. Every following
    /// line is one message, kept verbatim apart from its line terminator.
    /// When the declared count disagrees with the lines actually present,
    /// the actual count wins.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CatalogError> {
        let mut lines = reader.lines();

        let declared_line = lines.next().ok_or(CatalogError::MissingCount)??;
        let declared: i64 = declared_line
            .trim()
            .parse()
            .map_err(|_| CatalogError::InvalidCount(declared_line.trim().to_string()))?;

        let messages = lines.collect::<Result<Vec<_>, _>>()?;

        if i64::try_from(messages.len()).ok() != Some(declared) {
            warn!(
                declared,
                actual = messages.len(),
                "Declared message count differs from messages present, using actual count"
            );
        }

        Self::from_messages(messages)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false for a successfully built catalog.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by its 1-based index.
    pub fn get(&self, index: i32) -> Option<&str> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.messages.get(position).map(String::as_str)
    }

    /// Pick a message uniformly at random.
    ///
    /// Uses the calling thread's generator, so concurrent callers never
    /// contend on shared state.
    pub fn pick_random(&self) -> &str {
        let position = rand::thread_rng().gen_range(0..self.messages.len());
        &self.messages[position]
    }
}
