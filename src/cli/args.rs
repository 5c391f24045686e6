//! Command-line argument parsing

use crate::config::Settings;
use clap::Parser;
use rust_decimal::Decimal;

/// Reward ledger and postback reconciliation server
#[derive(Debug, Parser)]
#[command(name = "rewards-ledger-engine", version, about)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Shared secret that postbacks must echo in their `token` parameter
    #[arg(long)]
    pub postback_token: String,

    /// Smallest withdrawal amount users may request
    #[arg(long, default_value = "5.00")]
    pub min_withdrawal: Decimal,

    /// Share of the reported payout credited on the fallback path
    #[arg(long, default_value = "0.40")]
    pub reward_share: Decimal,
}

impl ServerArgs {
    /// Initial engine settings from the parsed arguments
    pub fn to_settings(&self) -> Settings {
        Settings {
            postback_token: self.postback_token.clone(),
            min_withdrawal: self.min_withdrawal,
            default_reward_share: self.reward_share,
        }
    }
}
