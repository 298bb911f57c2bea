//! Hidden-token filter, persisted as a JSON list of addresses.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Set of token addresses hidden from the holdings display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFilter {
    hidden: BTreeSet<Address>,
    path: Option<PathBuf>,
}

impl VisibilityFilter {
    /// Filter that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file is an empty filter bound to that path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let hidden = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read visibility file: {}", path.display()))?;
            let list: Vec<Address> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse visibility file: {}", path.display()))?;
            list.into_iter().collect()
        } else {
            BTreeSet::new()
        };
        debug!(path = %path.display(), hidden = hidden.len(), "Visibility filter loaded");
        Ok(Self {
            hidden,
            path: Some(path),
        })
    }

    /// Write the hidden list back to the bound path, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let list: Vec<&Address> = self.hidden.iter().collect();
        let content = serde_json::to_string_pretty(&list)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write visibility file: {}", path.display()))?;
        info!(path = %path.display(), hidden = self.hidden.len(), "Visibility filter saved");
        Ok(())
    }

    /// Returns true if the token was not already hidden.
    pub fn hide(&mut self, token: Address) -> bool {
        self.hidden.insert(token)
    }

    /// Returns true if the token was hidden.
    pub fn unhide(&mut self, token: Address) -> bool {
        self.hidden.remove(&token)
    }

    pub fn is_hidden(&self, token: &Address) -> bool {
        self.hidden.contains(token)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &Address> {
        self.hidden.iter()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
