//! Contact subcommands: list, verify, remove, compare.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use talita_core::Config;
use talita_handshake::{Fingerprint, JsonContactStore, compare_fingerprints};

/// Contact subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum ContactsAction {
    /// List stored contacts.
    List,
    /// Mark a contact as verified after comparing fingerprints.
    Verify {
        /// Contact label.
        label: String,
    },
    /// Forget a contact.
    Remove {
        /// Contact label.
        label: String,
    },
    /// Compare a stored contact against a fingerprint read out by its owner.
    Compare {
        /// Contact label.
        label: String,
        /// Fingerprint in hex, with or without separators.
        fingerprint: String,
    },
}

/// Open the contact store named by the configuration.
pub fn open_store(config: &Config) -> anyhow::Result<JsonContactStore> {
    let path = config.contacts.resolved_path().ok_or_else(|| {
        anyhow::anyhow!("No data directory found. Use --contacts <path>")
    })?;
    Ok(JsonContactStore::open(path)?)
}

/// Execute a contacts subcommand.
pub fn run(action: ContactsAction, config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    execute(action, &mut store, &mut io::stdout())
}

fn execute(
    action: ContactsAction,
    store: &mut JsonContactStore,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        ContactsAction::List => list(store, out),
        ContactsAction::Verify { label } => {
            if !store.mark_verified(&label)? {
                anyhow::bail!("No contact named {label:?}");
            }
            writeln!(out, "Marked {label} as verified")?;
            Ok(())
        }
        ContactsAction::Remove { label } => {
            if store.remove(&label)?.is_none() {
                anyhow::bail!("No contact named {label:?}");
            }
            writeln!(out, "Removed {label}")?;
            Ok(())
        }
        ContactsAction::Compare { label, fingerprint } => {
            compare(store, &label, &fingerprint, out)
        }
    }
}

fn list(store: &JsonContactStore, out: &mut impl Write) -> anyhow::Result<()> {
    let book = store.book();
    if book.is_empty() {
        writeln!(out, "No contacts stored")?;
        return Ok(());
    }
    writeln!(out, "{:<20} {:<64} {:<8}", "LABEL", "FINGERPRINT", "VERIFIED")?;
    for entry in book.entries() {
        writeln!(
            out,
            "{:<20} {:<64} {:<8}",
            entry.label.as_deref().unwrap_or("-"),
            entry.fingerprint,
            if entry.verified { "yes" } else { "no" }
        )?;
    }
    Ok(())
}

fn compare(
    store: &JsonContactStore,
    label: &str,
    fingerprint: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let given: Fingerprint = fingerprint.parse()?;
    let entry = store
        .book()
        .find_by_label(label)
        .ok_or_else(|| anyhow::anyhow!("No contact named {label:?}"))?;
    let (output, matches) = compare_fingerprints(&entry.fingerprint, label, &given, "Read out");
    writeln!(out, "{output}")?;
    if !matches {
        anyhow::bail!("Fingerprint for {label} does not match the stored key");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use talita_handshake::{ContactStore, TrustedContact, test_key_pair};

    use super::*;

    fn store_with_alice(dir: &tempfile::TempDir) -> JsonContactStore {
        let mut store = JsonContactStore::open(dir.path().join("contacts.json")).unwrap();
        store
            .persist(
                &TrustedContact::from_public_key(test_key_pair().public().clone())
                    .with_label("alice"),
            )
            .unwrap();
        store
    }

    fn run_to_string(action: ContactsAction, store: &mut JsonContactStore) -> anyhow::Result<String> {
        let mut out = Vec::new();
        execute(action, store, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn list_empty_and_populated() {
        let dir = tempfile::tempdir().unwrap();
        let mut empty = JsonContactStore::open(dir.path().join("none.json")).unwrap();
        assert!(run_to_string(ContactsAction::List, &mut empty)
            .unwrap()
            .contains("No contacts"));

        let mut store = store_with_alice(&dir);
        let text = run_to_string(ContactsAction::List, &mut store).unwrap();
        assert!(text.contains("alice"));
        assert!(text.contains(&test_key_pair().public().fingerprint().to_string()));
        assert!(text.contains("no"));
    }

    #[test]
    fn verify_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_alice(&dir);

        run_to_string(
            ContactsAction::Verify {
                label: "alice".into(),
            },
            &mut store,
        )
        .unwrap();
        assert!(store.book().find_by_label("alice").unwrap().verified);

        run_to_string(
            ContactsAction::Remove {
                label: "alice".into(),
            },
            &mut store,
        )
        .unwrap();
        assert!(store.book().is_empty());

        assert!(run_to_string(
            ContactsAction::Remove {
                label: "alice".into(),
            },
            &mut store,
        )
        .is_err());
    }

    #[test]
    fn compare_reports_match_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with_alice(&dir);
        let fp = test_key_pair().public().fingerprint();

        let text = run_to_string(
            ContactsAction::Compare {
                label: "alice".into(),
                fingerprint: fp.grouped(),
            },
            &mut store,
        )
        .unwrap();
        assert!(text.contains("Fingerprints MATCH"));

        let err = run_to_string(
            ContactsAction::Compare {
                label: "alice".into(),
                fingerprint: "00".repeat(32),
            },
            &mut store,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}
