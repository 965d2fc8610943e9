//! Sender identity resolution.
//!
//! Chat payloads carry opaque user ids. The cache turns them into display
//! names with at most one lookup per id per run.

use std::collections::HashMap;

use crate::domain::Result;

/// Looks up a display name for a user id.
pub trait IdentitySource {
    /// Returns `Ok(None)` when the id is unknown to the service.
    ///
    /// # Errors
    /// Returns error if the lookup request fails.
    fn lookup(&mut self, id: &str) -> Result<Option<String>>;
}

/// Per-run cache of resolved identities.
///
/// Failed and not-found lookups are cached as the raw id, so a broken id is
/// never queried twice.
#[derive(Debug, Default)]
pub struct IdentityCache {
    names: HashMap<String, String>,
    lookups: usize,
}

impl IdentityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `id`, querying `source` only on the first request for it.
    pub fn resolve(&mut self, id: &str, source: &mut dyn IdentitySource) -> String {
        if let Some(name) = self.names.get(id) {
            return name.clone();
        }

        self.lookups += 1;
        let name = match source.lookup(id) {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => {
                tracing::debug!(id, "Identity not found, using raw id");
                id.to_string()
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "Identity lookup failed, using raw id");
                id.to_string()
            }
        };

        self.names.insert(id.to_string(), name.clone());
        name
    }

    /// Number of lookups issued against a source.
    #[must_use]
    pub const fn lookups(&self) -> usize {
        self.lookups
    }

    /// Number of cached identities.
    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }
}
