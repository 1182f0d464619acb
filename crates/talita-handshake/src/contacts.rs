//! Trusted contacts.
//!
//! A contact is a peer public key accepted from a scanned code, optionally
//! bound to a label the user chose. Labels are trust-on-first-use: once a
//! label is bound to a fingerprint, a different key under the same label is
//! refused until the user removes the old entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HandshakeError;
use crate::fingerprint::Fingerprint;
use crate::material::PublicKeyMaterial;
use crate::payload::{self, EncodedPayload};

/// A validated peer key together with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedContact {
    public_key: PublicKeyMaterial,
    fingerprint: Fingerprint,
    label: Option<String>,
}

impl TrustedContact {
    pub fn from_public_key(public_key: PublicKeyMaterial) -> Self {
        let fingerprint = public_key.fingerprint();
        Self {
            public_key,
            fingerprint,
            label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub const fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }

    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The key re-encoded as payload text.
    pub fn payload(&self) -> EncodedPayload {
        payload::encode_material(&self.public_key)
    }

    pub fn into_parts(self) -> (PublicKeyMaterial, Fingerprint, Option<String>) {
        (self.public_key, self.fingerprint, self.label)
    }
}

/// Persistence collaborator for accepted contacts.
pub trait ContactStore {
    /// Store `contact`. Fails with [`HandshakeError::LabelConflict`] when its
    /// label is already bound to another key.
    fn persist(&mut self, contact: &TrustedContact) -> Result<(), HandshakeError>;
}

impl<S: ContactStore + ?Sized> ContactStore for &mut S {
    fn persist(&mut self, contact: &TrustedContact) -> Result<(), HandshakeError> {
        (**self).persist(contact)
    }
}

/// Keeps contacts in memory only.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    contacts: Vec<TrustedContact>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contacts(&self) -> &[TrustedContact] {
        &self.contacts
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&TrustedContact> {
        self.contacts.iter().find(|c| c.fingerprint == *fingerprint)
    }
}

impl ContactStore for MemoryContactStore {
    fn persist(&mut self, contact: &TrustedContact) -> Result<(), HandshakeError> {
        if let Some(label) = contact.label()
            && let Some(bound) = self
                .contacts
                .iter()
                .find(|c| c.label() == Some(label) && c.fingerprint != contact.fingerprint)
        {
            return Err(HandshakeError::LabelConflict {
                label: label.to_string(),
                expected: bound.fingerprint.to_string(),
                actual: contact.fingerprint.to_string(),
            });
        }
        match self
            .contacts
            .iter_mut()
            .find(|c| c.fingerprint == contact.fingerprint)
        {
            Some(existing) => {
                if existing.label.is_none() {
                    existing.label.clone_from(&contact.label);
                }
            }
            None => self.contacts.push(contact.clone()),
        }
        Ok(())
    }
}

/// One stored contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub fingerprint: Fingerprint,
    /// Payload text as scanned, re-validated on every load.
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Unix timestamp of the first acceptance.
    pub first_seen: i64,
    /// Unix timestamp of the most recent acceptance.
    pub last_seen: i64,
    /// Whether the user compared fingerprints out of band.
    #[serde(default)]
    pub verified: bool,
}

/// Result of checking a fingerprint against the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactCheck {
    /// Neither the key nor the label has been seen.
    New,
    /// The key is already stored (under this label, if one was given).
    Known,
    /// The label is bound to a different key.
    Mismatch {
        expected: Fingerprint,
        actual: Fingerprint,
    },
}

/// Contacts keyed by fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBook {
    contacts: BTreeMap<Fingerprint, ContactEntry>,
}

impl ContactBook {
    /// Load from a JSON file. A missing file is an empty book.
    ///
    /// Every entry is decoded again; an entry whose payload no longer
    /// validates, or whose key does not match its fingerprint, fails the load.
    pub fn load(path: &Path) -> Result<Self, HandshakeError> {
        if !path.exists() {
            debug!(path = %path.display(), "No contact file, starting empty");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let book: Self = serde_json::from_str(&data)
            .map_err(|e| HandshakeError::Store(format!("Failed to parse contact file: {e}")))?;

        for (fingerprint, entry) in &book.contacts {
            let material = payload::decode(&entry.payload).map_err(|e| {
                HandshakeError::Store(format!("Contact {fingerprint} has an invalid payload: {e}"))
            })?;
            if material.fingerprint() != *fingerprint || entry.fingerprint != *fingerprint {
                return Err(HandshakeError::Store(format!(
                    "Contact {fingerprint} does not match its stored key"
                )));
            }
        }
        debug!(count = book.contacts.len(), "Loaded contacts");
        Ok(book)
    }

    /// Save to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), HandshakeError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HandshakeError::Store(format!("Failed to serialize contacts: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn check(&self, label: Option<&str>, fingerprint: &Fingerprint) -> ContactCheck {
        if let Some(entry) = label.and_then(|l| self.find_by_label(l)) {
            return if entry.fingerprint.matches(fingerprint) {
                ContactCheck::Known
            } else {
                ContactCheck::Mismatch {
                    expected: entry.fingerprint,
                    actual: *fingerprint,
                }
            };
        }
        if self.contacts.contains_key(fingerprint) {
            ContactCheck::Known
        } else {
            ContactCheck::New
        }
    }

    /// Insert `contact` or refresh its last-seen time. A label on `contact`
    /// is only applied to an unlabelled entry; a label stays bound to its key
    /// until the entry is removed.
    pub fn record(&mut self, contact: &TrustedContact, now: i64) {
        let entry = self
            .contacts
            .entry(contact.fingerprint)
            .or_insert_with(|| ContactEntry {
                fingerprint: contact.fingerprint,
                payload: contact.payload().into_string(),
                label: None,
                first_seen: now,
                last_seen: now,
                verified: false,
            });
        entry.last_seen = now;
        if entry.label.is_none() {
            entry.label.clone_from(&contact.label);
        }
    }

    /// Mark the contact under `label` as verified. Returns false if there is
    /// no such contact.
    pub fn mark_verified(&mut self, label: &str) -> bool {
        match self
            .contacts
            .values_mut()
            .find(|e| e.label.as_deref() == Some(label))
        {
            Some(entry) => {
                entry.verified = true;
                true
            }
            None => false,
        }
    }

    /// Remove the contact under `label`.
    pub fn remove(&mut self, label: &str) -> Option<ContactEntry> {
        let fingerprint = self.find_by_label(label)?.fingerprint;
        self.contacts.remove(&fingerprint)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&ContactEntry> {
        self.contacts
            .values()
            .find(|e| e.label.as_deref() == Some(label))
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ContactEntry> {
        self.contacts.get(fingerprint)
    }

    /// Entries in fingerprint order.
    pub fn entries(&self) -> impl Iterator<Item = &ContactEntry> {
        self.contacts.values()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// A [`ContactBook`] backed by a JSON file, saved after every change.
#[derive(Debug)]
pub struct JsonContactStore {
    path: PathBuf,
    book: ContactBook,
}

impl JsonContactStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HandshakeError> {
        let path = path.into();
        let book = ContactBook::load(&path)?;
        Ok(Self { path, book })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn book(&self) -> &ContactBook {
        &self.book
    }

    pub fn mark_verified(&mut self, label: &str) -> Result<bool, HandshakeError> {
        let found = self.book.mark_verified(label);
        if found {
            self.book.save(&self.path)?;
        }
        Ok(found)
    }

    pub fn remove(&mut self, label: &str) -> Result<Option<ContactEntry>, HandshakeError> {
        let removed = self.book.remove(label);
        if removed.is_some() {
            self.book.save(&self.path)?;
        }
        Ok(removed)
    }
}

impl ContactStore for JsonContactStore {
    fn persist(&mut self, contact: &TrustedContact) -> Result<(), HandshakeError> {
        match self.book.check(contact.label(), contact.fingerprint()) {
            ContactCheck::Mismatch { expected, actual } => {
                warn!(
                    label = contact.label().unwrap_or_default(),
                    %expected,
                    %actual,
                    "Label is bound to a different key"
                );
                return Err(HandshakeError::LabelConflict {
                    label: contact.label().unwrap_or_default().to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            ContactCheck::New => {
                info!(fingerprint = %contact.fingerprint(), "Storing new contact");
            }
            ContactCheck::Known => {
                let stored = self
                    .book
                    .get(contact.fingerprint())
                    .and_then(|e| e.label.as_deref());
                if let (Some(stored), Some(requested)) = (stored, contact.label())
                    && stored != requested
                {
                    warn!(
                        fingerprint = %contact.fingerprint(),
                        stored,
                        requested,
                        "Key already labelled, keeping existing label"
                    );
                }
                debug!(fingerprint = %contact.fingerprint(), "Refreshing known contact");
            }
        }
        self.book.record(contact, unix_now());
        self.book.save(&self.path)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or_default()
}
