//! Material names and their ledger table identifiers.

use serde::{Deserialize, Serialize};

use labstock_core::{DomainError, DomainResult};

/// A raw material, identified by a canonical table key.
///
/// Names that differ only in case, surrounding whitespace, inner whitespace
/// runs or punctuation map to the same key, so "Liquid  Nitrogen" and
/// "liquid-nitrogen" share one ledger. The display name keeps the caller's
/// casing with whitespace collapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    name: String,
    key: String,
}

impl Material {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Err(DomainError::validation("material is required"));
        }
        let key = table_key(&name);
        if key.is_empty() {
            return Err(DomainError::validation(format!(
                "material '{name}' has no usable characters"
            )));
        }
        Ok(Self { name, key })
    }

    /// Rebuild a material from a table key discovered on disk.
    pub fn from_table_key(key: &str) -> DomainResult<Self> {
        Self::parse(&key.replace('_', " "))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical identifier of the material's ledger table.
    pub fn table_key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Material {}

impl core::hash::Hash for Material {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl core::fmt::Display for Material {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

fn table_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}
