//! Offer catalog types
//!
//! Offers are owned by the external catalog collaborator; the ledger only
//! reads them to compute the user's share of a completed offer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Offer identifier
pub type OfferId = u32;

/// Catalog entry for a third-party offer
///
/// Read-only from the ledger's perspective. `user_reward` is the share of
/// the advertiser `payout` paid to the user when the offer is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// The offer ID
    pub id: OfferId,

    /// Amount the advertiser pays per completion
    pub payout: Decimal,

    /// Configured amount credited to the user on approval
    pub user_reward: Decimal,

    /// Points credited to the user on approval
    pub reward_points: i64,

    /// Whether the offer can currently be started
    pub is_active: bool,
}
