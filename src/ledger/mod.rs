//! Coin resource gate
//!
//! This module rations access to costly practice actions using a capped,
//! slowly-regenerating coin balance:
//! - `ResourceAccount` + pure time-based regeneration
//! - `CoinLedger` with the atomic `try_spend` gate
//! - Persistence through the `LedgerStore` seam

mod account;
mod ledger;
mod store;

pub use account::{apply_regen, sanitize_document, ResourceAccount};
pub use ledger::{CoinLedger, LedgerError, SpendOutcome};
pub use store::{JsonFileStore, LedgerStore, MemoryStore};

/// Maximum coin balance an account can hold.
pub const COIN_CAP: u32 = 50;

/// One coin regenerates every 10 minutes.
pub const REGEN_INTERVAL_SECS: i64 = 600;

/// Cost of starting one practice session.
pub const SESSION_COST: u32 = 1;
