use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::account::{apply_regen, sanitize_document, ResourceAccount};
use super::store::LedgerStore;
use super::COIN_CAP;
use crate::entitlement::EntitlementProvider;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance mutation succeeded in memory but could not be written
    /// back. Reported as its own kind so callers can choose their policy.
    #[error("ledger persistence failed: {0}")]
    Persistence(String),
}

/// Outcome of an atomic spend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendOutcome {
    /// Deducted and persisted (or bypassed via unlimited entitlement)
    Granted { balance: u32 },

    /// Deducted in memory, but the write-back failed. The caller proceeds
    /// optimistically; the gap is visible here instead of a swallowed log.
    GrantedUnpersisted { balance: u32 },

    /// Insufficient balance. Nothing was mutated.
    Denied { balance: u32 },
}

impl SpendOutcome {
    pub fn granted(&self) -> bool {
        !matches!(self, SpendOutcome::Denied { .. })
    }
}

/// The coin resource gate.
///
/// Owns the account as a single mutable cell behind a mutex: every read and
/// write goes through here, there is no parallel "latest snapshot" field.
/// The account is hydrated (and sanitized) once at construction and fully
/// re-persisted after every mutation.
pub struct CoinLedger {
    account: Mutex<ResourceAccount>,
    store: Box<dyn LedgerStore>,
    entitlement: Arc<dyn EntitlementProvider>,
}

impl CoinLedger {
    /// Hydrate the ledger from its store, sanitizing malformed state.
    pub fn load(store: Box<dyn LedgerStore>, entitlement: Arc<dyn EntitlementProvider>) -> Self {
        let now = Utc::now();

        let account = match store.load() {
            Ok(Some(doc)) => sanitize_document(&doc, now),
            Ok(None) => {
                info!("No ledger document found, starting with a full account");
                ResourceAccount::full(now)
            }
            Err(e) => {
                warn!("Failed to load ledger document, starting full: {e:#}");
                ResourceAccount::full(now)
            }
        };

        info!(
            "Coin ledger hydrated: balance={}/{}",
            account.balance, COIN_CAP
        );

        Self {
            account: Mutex::new(account),
            store,
            entitlement,
        }
    }

    /// Whether the entitlement provider currently reports unlimited access
    pub fn unlimited(&self) -> bool {
        self.entitlement.is_unlimited()
    }

    /// Current balance after applying any owed regeneration.
    ///
    /// The regenerated account is committed and persisted best-effort; a
    /// failed write-back does not hide the regenerated balance.
    pub async fn balance(&self) -> u32 {
        let mut account = self.account.lock().await;
        let regened = apply_regen(&account, Utc::now());

        if regened != *account {
            if let Err(e) = self.store.save(&regened) {
                warn!("Failed to persist regenerated balance: {e:#}");
            }
            *account = regened;
        }

        account.balance
    }

    /// Non-mutating affordability check.
    ///
    /// True if the account is unlimited or the regenerated balance covers
    /// `cost`. This exists for display purposes only; the pipeline gates
    /// through `try_spend`, which re-checks under the same lock it mutates
    /// under.
    pub async fn authorize(&self, cost: u32) -> bool {
        if self.entitlement.is_unlimited() {
            return true;
        }

        let account = self.account.lock().await;
        apply_regen(&account, Utc::now()).balance >= cost
    }

    /// Atomically regenerate, check, and deduct.
    ///
    /// The check and the deduction happen under one lock acquisition with no
    /// awaited work in between, so two concurrent callers cannot both pass
    /// on the same coin. Unlimited accounts are granted without touching the
    /// stored balance, which survives for a later downgrade.
    pub async fn try_spend(&self, cost: u32, reason: &str) -> SpendOutcome {
        let mut account = self.account.lock().await;

        if self.entitlement.is_unlimited() {
            info!("Spend bypassed (unlimited): cost={cost} reason={reason}");
            return SpendOutcome::Granted {
                balance: account.balance,
            };
        }

        let regened = apply_regen(&account, Utc::now());

        if regened.balance < cost {
            // Still commit the regeneration itself; the spend mutated nothing
            if regened != *account {
                if let Err(e) = self.store.save(&regened) {
                    warn!("Failed to persist regenerated balance: {e:#}");
                }
                *account = regened;
            }
            info!(
                "Spend denied: balance={} cost={cost} reason={reason}",
                account.balance
            );
            return SpendOutcome::Denied {
                balance: account.balance,
            };
        }

        let spent = ResourceAccount {
            balance: regened.balance - cost,
            last_updated: Utc::now().max(regened.last_updated),
        };

        let outcome = match self.store.save(&spent) {
            Ok(()) => SpendOutcome::Granted {
                balance: spent.balance,
            },
            Err(e) => {
                warn!("Spend applied but not persisted ({reason}): {e:#}");
                SpendOutcome::GrantedUnpersisted {
                    balance: spent.balance,
                }
            }
        };

        info!(
            "Spent {cost} coin(s) for {reason}: balance {} -> {}",
            regened.balance, spent.balance
        );
        *account = spent;

        outcome
    }

    /// Refill to the cap. Support/test recovery path only.
    pub async fn reset(&self) -> Result<(), LedgerError> {
        let mut account = self.account.lock().await;
        let full = ResourceAccount::full(Utc::now());

        self.store
            .save(&full)
            .map_err(|e| LedgerError::Persistence(format!("{e:#}")))?;

        *account = full;
        info!("Coin ledger reset to cap");
        Ok(())
    }
}
