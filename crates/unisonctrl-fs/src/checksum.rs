//! SHA-256 digest utilities
//!
//! All digests use the canonical format `sha256:<hex>`. [`Digest`]
//! hashes an ordered sequence of string fields with explicit length
//! prefixes, so field boundaries can never be confused
//! (`["ab", "c"]` and `["a", "bc"]` hash differently).

use sha2::{Digest as _, Sha256};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Incremental, order-sensitive digest over string fields.
#[derive(Clone, Default)]
pub struct Digest {
    hasher: Sha256,
}

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field.
    pub fn field(&mut self, value: &str) -> &mut Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Append a list of fields, prefixed by its length so adjacent lists
    /// cannot trade elements.
    pub fn list<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<S> = values.into_iter().collect();
        self.hasher.update((values.len() as u64).to_le_bytes());
        for value in &values {
            self.field(value.as_ref());
        }
        self
    }

    /// Finish and render as `sha256:<hex>`.
    pub fn finish(&self) -> String {
        format!("{}{:x}", PREFIX, self.hasher.clone().finalize())
    }
}
