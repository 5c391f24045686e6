//! Offer catalog
//!
//! Read-mostly store of the offers users can start. Reward terms on the
//! offer take precedence over share-of-payout math in the pipeline.

use crate::types::{LedgerError, Offer, OfferId};
use dashmap::DashMap;

/// Store of published offers
#[derive(Debug, Default)]
pub struct OfferCatalog {
    offers: DashMap<OfferId, Offer>,
}

impl OfferCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an offer
    pub fn publish(&self, offer: Offer) {
        self.offers.insert(offer.id, offer);
    }

    /// Snapshot one offer
    pub fn get(&self, id: OfferId) -> Option<Offer> {
        self.offers.get(&id).map(|o| o.value().clone())
    }

    /// Snapshot an offer, failing if it does not exist
    pub fn require(&self, id: OfferId) -> Result<Offer, LedgerError> {
        self.get(id).ok_or(LedgerError::OfferNotFound { offer: id })
    }

    /// Toggle whether new completions may start for an offer
    ///
    /// Deactivation never affects completions already in flight.
    pub fn set_active(&self, id: OfferId, active: bool) -> Result<(), LedgerError> {
        let mut entry = self
            .offers
            .get_mut(&id)
            .ok_or(LedgerError::OfferNotFound { offer: id })?;
        entry.is_active = active;
        Ok(())
    }

    /// Snapshot all offers
    pub fn all(&self) -> Vec<Offer> {
        self.offers.iter().map(|o| o.value().clone()).collect()
    }
}
