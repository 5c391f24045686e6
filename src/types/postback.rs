//! Postback request types and parameter normalization
//!
//! Advertiser networks deliver loosely-typed query/form parameters, and the
//! subject identifier historically arrives under several different names.
//! All alias resolution happens in one place, [`PostbackParams::normalize`],
//! with a documented precedence order.

use super::error::LedgerError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Parameter names accepted for the subject identifier, in precedence order
///
/// The first present alias wins, even if a later alias also carries a value.
pub const SUBJECT_ALIASES: [&str; 4] = ["sub_id", "subid", "s1", "user_id"];

/// Parameter names accepted for the reported payout, in precedence order
pub const PAYOUT_ALIASES: [&str; 2] = ["payout", "amount"];

/// Raw, untrusted parameters of one postback delivery
///
/// Wraps the query/form parameters verbatim. Nothing is validated at
/// construction; the audit log stores these before any validation runs so
/// that even malformed deliveries are auditable.
#[derive(Debug, Clone, Default)]
pub struct PostbackParams {
    params: HashMap<String, String>,
}

/// A validated, normalized postback
///
/// Produced by [`PostbackParams::normalize`]; carries everything the
/// reconciliation pipeline needs after authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Postback {
    /// Resolved subject identifier: a completion record id, or a raw user id
    /// when no completion record matches
    pub subject: u64,

    /// Reported advertiser payout, positive
    pub payout: Decimal,

    /// Reporting network name, "unknown" when absent
    pub network: String,

    /// Raw status string as reported, if any
    pub status: Option<String>,
}

impl PostbackParams {
    /// Wrap a raw parameter map
    pub fn new(params: HashMap<String, String>) -> Self {
        PostbackParams { params }
    }

    /// Build from key/value pairs, for tests and manual construction
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        PostbackParams {
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a single raw parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The shared-secret token parameter, if present
    pub fn token(&self) -> Option<&str> {
        self.get("token")
    }

    /// The reporting network name, if present
    pub fn network(&self) -> Option<&str> {
        self.get("network")
    }

    /// The raw parameter map, for audit storage
    pub fn raw(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Resolve the subject identifier using the alias precedence order
    ///
    /// Returns the first alias that is present. A present-but-unparsable
    /// value is a validation error rather than a fallthrough to the next
    /// alias, so a malformed `sub_id` is never silently reinterpreted.
    fn subject(&self) -> Result<u64, LedgerError> {
        for alias in SUBJECT_ALIASES {
            if let Some(value) = self.get(alias) {
                return value.trim().parse::<u64>().map_err(|_| {
                    LedgerError::validation(format!(
                        "parameter '{}' is not a valid subject id: '{}'",
                        alias, value
                    ))
                });
            }
        }
        Err(LedgerError::validation("missing subject identifier"))
    }

    /// Resolve the reported payout amount
    fn payout(&self) -> Result<Decimal, LedgerError> {
        for alias in PAYOUT_ALIASES {
            if let Some(value) = self.get(alias) {
                let payout = value.trim().parse::<Decimal>().map_err(|_| {
                    LedgerError::validation(format!(
                        "parameter '{}' is not a valid amount: '{}'",
                        alias, value
                    ))
                })?;
                if payout <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "payout must be positive, got {}",
                        payout
                    )));
                }
                return Ok(payout);
            }
        }
        Err(LedgerError::validation("missing payout amount"))
    }

    /// Validate and normalize the raw parameters
    ///
    /// Requires a resolvable subject identifier and a positive numeric
    /// payout. Authentication is not this function's concern; the pipeline
    /// checks the token before normalizing.
    pub fn normalize(&self) -> Result<Postback, LedgerError> {
        Ok(Postback {
            subject: self.subject()?,
            payout: self.payout()?,
            network: self
                .network()
                .unwrap_or("unknown")
                .trim()
                .to_string(),
            status: self.get("status").map(str::to_string),
        })
    }
}
