//! Ordered sign catalog.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gesture::classifier::FingerPosition::{Closed, Up};
use crate::gesture::classifier::GestureSignature;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignEntry {
    pub signature: GestureSignature,
    pub label: String,
}

impl SignEntry {
    pub fn new(signature: GestureSignature, label: impl Into<String>) -> Self {
        SignEntry {
            signature,
            label: label.into(),
        }
    }
}

/// Signs recognised by the classifier. Lookup scans entries in order and the first
/// entry with a matching signature wins, so later duplicates are never produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignCatalog {
    entries: Vec<SignEntry>,
}

impl SignCatalog {
    pub fn new(entries: Vec<SignEntry>) -> Self {
        let catalog = SignCatalog { entries };
        for entry in catalog.shadowed() {
            warn!(
                label = %entry.label,
                signature = %entry.signature,
                "sign is unreachable, an earlier entry has the same signature"
            );
        }
        catalog
    }

    /// from_json parses a catalog from a JSON array of `{signature, label}` records.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let entries: Vec<SignEntry> = serde_json::from_str(json)?;
        Ok(SignCatalog::new(entries))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("cannot read sign catalog {}", path.display()))?;
        SignCatalog::from_json(&json)
    }

    pub fn entries(&self) -> &[SignEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, signature: &GestureSignature) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.signature == *signature)
            .map(|entry| entry.label.as_str())
    }

    /// Entries that can never be returned because an earlier entry shares their signature.
    pub fn shadowed(&self) -> Vec<&SignEntry> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .filter(|entry| !seen.insert(entry.signature))
            .collect()
    }
}

impl Default for SignCatalog {
    /// The reference vocabulary. "Oui" shares its handshape with "Bonjour" and is
    /// therefore shadowed; it is kept so label sets stay in sync with the chat UI.
    fn default() -> Self {
        SignCatalog::new(vec![
            SignEntry::new(GestureSignature::new(Up, Closed, Closed, Closed, Closed), "Bonjour"),
            SignEntry::new(GestureSignature::new(Up, Closed, Closed, Closed, Closed), "Oui"),
            SignEntry::new(GestureSignature::new(Closed, Up, Closed, Closed, Closed), "Non"),
            SignEntry::new(GestureSignature::new(Up, Up, Up, Up, Up), "Merci"),
            SignEntry::new(GestureSignature::new(Closed, Up, Up, Closed, Closed), "Ça va"),
            SignEntry::new(GestureSignature::new(Up, Up, Closed, Closed, Up), "Je t'aime"),
            SignEntry::new(GestureSignature::new(Closed, Closed, Closed, Closed, Closed), "Attendre"),
        ])
    }
}
