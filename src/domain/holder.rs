//! Token Holder Statistics
//!
//! Turns a raw holder listing into per-holder shares plus summary stats.
//! Computed per request, never cached.

use serde::{Deserialize, Serialize};

/// Raw balance row as reported by the holder provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderBalance {
    pub owner: String,
    pub token_account: Option<String>,
    /// Raw base-unit amount, kept as a string to avoid overflow
    pub amount: String,
    /// Human-scaled amount
    pub ui_amount: f64,
    pub decimals: u8,
}

/// One wallet's balance with its share of the observed supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderRecord {
    pub owner: String,
    pub token_account: Option<String>,
    pub amount: String,
    pub ui_amount: f64,
    pub decimals: u8,
    /// Share of observed supply, 0-100
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderSummary {
    pub total_holders: usize,
    /// Sum of all observed balances (not the token's real supply)
    pub total_supply: f64,
    pub largest_balance: f64,
    pub average_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderReport {
    pub holders: Vec<HolderRecord>,
    pub stats: HolderSummary,
}

impl HolderReport {
    /// Compute shares and summary stats. Returns `None` for an empty listing.
    pub fn from_balances(balances: Vec<HolderBalance>) -> Option<Self> {
        if balances.is_empty() {
            return None;
        }

        let total_supply: f64 = balances.iter().map(|b| b.ui_amount).sum();
        let largest_balance = balances
            .iter()
            .map(|b| b.ui_amount)
            .fold(f64::MIN, f64::max);
        let total_holders = balances.len();

        let holders = balances
            .into_iter()
            .map(|b| {
                let percentage = if total_supply > 0.0 {
                    b.ui_amount / total_supply * 100.0
                } else {
                    0.0
                };
                HolderRecord {
                    owner: b.owner,
                    token_account: b.token_account,
                    amount: b.amount,
                    ui_amount: b.ui_amount,
                    decimals: b.decimals,
                    percentage,
                }
            })
            .collect();

        Some(Self {
            holders,
            stats: HolderSummary {
                total_holders,
                total_supply,
                largest_balance,
                average_balance: total_supply / total_holders as f64,
            },
        })
    }
}
