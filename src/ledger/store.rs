use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

use super::account::ResourceAccount;

/// Persistence seam for the coin ledger.
///
/// The store holds one flat key→value document per logical ledger. Load
/// returns the raw document so the caller can sanitize it; save receives the
/// already-validated account and must write it fully or fail (no partial
/// writes).
pub trait LedgerStore: Send + Sync {
    /// Read the persisted document, `None` if nothing was ever saved
    fn load(&self) -> Result<Option<serde_json::Value>>;

    /// Persist the account, replacing the previous document
    fn save(&self, account: &ResourceAccount) -> Result<()>;
}

/// Ledger store backed by a single JSON file on local disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<serde_json::Value>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ledger file {}", self.path.display()))?;

        // Unparseable JSON is still a document as far as the caller is
        // concerned; hand back something that will sanitize to a reset.
        Ok(Some(
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
        ))
    }

    fn save(&self, account: &ResourceAccount) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory {}", parent.display()))?;
        }

        let doc = serde_json::json!({
            "balance": account.balance,
            "last_updated": account.last_updated.to_rfc3339(),
        });

        fs::write(&self.path, serde_json::to_vec(&doc)?)
            .with_context(|| format!("Failed to write ledger file {}", self.path.display()))?;

        info!(
            "Ledger persisted: balance={} ({})",
            account.balance,
            self.path.display()
        );

        Ok(())
    }
}

/// In-memory ledger store for ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Option<serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing document
    pub fn with_document(doc: serde_json::Value) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<serde_json::Value>> {
        Ok(self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, account: &ResourceAccount) -> Result<()> {
        let doc = serde_json::json!({
            "balance": account.balance,
            "last_updated": account.last_updated.to_rfc3339(),
        });
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = Some(doc);
        Ok(())
    }
}
