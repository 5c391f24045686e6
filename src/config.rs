//! Runtime configuration
//!
//! Settings are injected into the pipeline and withdrawal desk rather than
//! read from a process-wide singleton, and consumers take a fresh snapshot
//! per request so that admin changes (a rotated postback token, a new
//! withdrawal minimum) apply to the next delivery without a restart.

use rust_decimal::Decimal;
use std::sync::RwLock;

/// One consistent snapshot of the engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Shared secret that advertiser networks must echo in postbacks
    pub postback_token: String,

    /// Smallest withdrawal amount a user may request
    pub min_withdrawal: Decimal,

    /// Share of the reported payout credited on the fallback path, in [0, 1]
    ///
    /// Used when a postback resolves a raw user id and no offer-configured
    /// reward applies.
    pub default_reward_share: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            postback_token: String::new(),
            min_withdrawal: Decimal::new(500, 2),        // 5.00
            default_reward_share: Decimal::new(4000, 4), // 0.40
        }
    }
}

/// Source of setting snapshots
///
/// `current()` must return a consistent snapshot; callers read it once per
/// request and never cache it across requests.
pub trait SettingsProvider: Send + Sync {
    /// Take a fresh snapshot of the current settings
    fn current(&self) -> Settings;
}

/// Mutable settings store supporting live admin updates
#[derive(Debug)]
pub struct LiveSettings {
    inner: RwLock<Settings>,
}

impl LiveSettings {
    /// Create a store with the given initial settings
    pub fn new(settings: Settings) -> Self {
        LiveSettings {
            inner: RwLock::new(settings),
        }
    }

    /// Apply an in-place update, visible to the next `current()` call
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsProvider for LiveSettings {
    fn current(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
