//! Credential table: VK sender id -> TShock application REST token.
//!
//! Built once at startup from TShock's `ApplicationRestTokens` and never mutated afterwards, so it
//! is shared between request tasks behind an `Arc` without locking.

use std::collections::HashMap;

/// One authorized VK user and the REST token their commands run under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    /// Opaque TShock application REST token.
    pub credential: String,
    /// TShock account name, for logs.
    pub display_name: String,
    /// TShock group name, for logs.
    pub display_group: String,
    pub sender_id: i64,
}

/// Sender-indexed lookup of credential entries.
///
/// When several tokens map to the same sender, the first one inserted is kept. The loader inserts
/// in file order, but that order is not part of the contract and callers should not rely on it.
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    by_sender: HashMap<i64, CredentialEntry>,
}

impl CredentialTable {
    /// Build a table from entries; the first entry for each sender wins.
    pub fn from_entries(entries: impl IntoIterator<Item = CredentialEntry>) -> Self {
        let mut by_sender: HashMap<i64, CredentialEntry> = HashMap::new();
        for entry in entries {
            if let Some(kept) = by_sender.get(&entry.sender_id) {
                log::warn!(
                    "credentials: VK id {} already mapped to {}, ignoring token for {}",
                    entry.sender_id,
                    kept.display_name,
                    entry.display_name
                );
                continue;
            }
            by_sender.insert(entry.sender_id, entry);
        }
        Self { by_sender }
    }

    /// Entry authorized for `sender_id`, if any.
    pub fn lookup(&self, sender_id: i64) -> Option<&CredentialEntry> {
        self.by_sender.get(&sender_id)
    }

    pub fn len(&self) -> usize {
        self.by_sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sender.is_empty()
    }
}
