use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{COIN_CAP, REGEN_INTERVAL_SECS};

/// Persisted coin account state.
///
/// Serialized as a flat key→value document: `{"balance": n, "last_updated":
/// "<rfc3339>"}`. The `unlimited` entitlement flag is intentionally not part
/// of this state: it is derived live from the entitlement provider so that a
/// downgrade restores whatever balance was stored before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccount {
    /// Current balance, always in `0..=COIN_CAP`
    pub balance: u32,

    /// Timestamp of the last balance mutation (spend or applied regen).
    /// Monotonically non-decreasing.
    pub last_updated: DateTime<Utc>,
}

impl ResourceAccount {
    /// A fresh account at the cap, e.g. first launch or corrupt-state recovery
    pub fn full(now: DateTime<Utc>) -> Self {
        Self {
            balance: COIN_CAP,
            last_updated: now,
        }
    }
}

/// Apply owed time-based regeneration. Pure function of `(account, now)`.
///
/// Regeneration advances `last_updated` by exact interval multiples so the
/// fractional remainder of the elapsed time carries over to the next check
/// instead of being lost (no regeneration drift). At the cap the balance is
/// untouched and `last_updated` only moves forward as a no-op marker.
///
/// Idempotent: calling twice with the same `now` equals calling once. A `now`
/// earlier than `last_updated` (clock skew) changes nothing.
pub fn apply_regen(account: &ResourceAccount, now: DateTime<Utc>) -> ResourceAccount {
    if account.balance >= COIN_CAP {
        return ResourceAccount {
            balance: account.balance,
            last_updated: account.last_updated.max(now),
        };
    }

    let elapsed = now.signed_duration_since(account.last_updated);
    let steps = elapsed.num_seconds().div_euclid(REGEN_INTERVAL_SECS);
    if steps <= 0 {
        return account.clone();
    }

    let regained = u32::try_from(steps).unwrap_or(u32::MAX);
    let balance = account.balance.saturating_add(regained).min(COIN_CAP);

    ResourceAccount {
        balance,
        last_updated: account.last_updated + Duration::seconds(steps * REGEN_INTERVAL_SECS),
    }
}

/// Rebuild an account from a persisted document, tolerating corruption.
///
/// A corrupt local cache must never lock the learner out: anything that does
/// not parse as a balance plus timestamp sanitizes to a full account stamped
/// `now`. Out-of-range numeric balances clamp into `0..=COIN_CAP`.
pub fn sanitize_document(doc: &serde_json::Value, now: DateTime<Utc>) -> ResourceAccount {
    let balance = doc.get("balance").and_then(parse_balance);
    let last_updated = doc
        .get("last_updated")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    match (balance, last_updated) {
        (Some(balance), Some(last_updated)) => ResourceAccount {
            balance,
            last_updated,
        },
        _ => {
            warn!("Malformed ledger document, resetting to full account: {doc}");
            ResourceAccount::full(now)
        }
    }
}

fn parse_balance(value: &serde_json::Value) -> Option<u32> {
    if let Some(n) = value.as_i64() {
        return Some(n.clamp(0, COIN_CAP as i64) as u32);
    }
    // Tolerate a float-encoded balance as long as it is finite
    if let Some(f) = value.as_f64() {
        if f.is_finite() {
            return Some((f as i64).clamp(0, COIN_CAP as i64) as u32);
        }
    }
    None
}
