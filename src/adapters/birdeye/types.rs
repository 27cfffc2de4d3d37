//! BirdEye API response types

use serde::Deserialize;

use crate::domain::HolderBalance;
use crate::ports::ListedToken;

/// Common envelope: `{ "success": bool, "data": ..., "message": ... }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BirdeyeResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemsData<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// `/v3/token/list` item
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenListItem {
    pub address: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub liquidity: Option<f64>,
}

impl TokenListItem {
    /// Items without an address are useless for mint lookups
    pub fn into_listed(self) -> Option<ListedToken> {
        let address = self.address.filter(|a| !a.is_empty())?;
        Some(ListedToken {
            address,
            symbol: self.symbol.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            liquidity: self.liquidity,
        })
    }
}

/// `/v3/token/holder` item
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HolderItem {
    pub owner: Option<String>,
    #[serde(default)]
    pub token_account: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub ui_amount: Option<f64>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl HolderItem {
    pub fn into_balance(self) -> Option<HolderBalance> {
        let owner = self.owner.filter(|o| !o.is_empty())?;
        Some(HolderBalance {
            owner,
            token_account: self.token_account,
            amount: self.amount.unwrap_or_else(|| "0".to_string()),
            ui_amount: self.ui_amount.unwrap_or(0.0),
            decimals: self.decimals.unwrap_or(0),
        })
    }
}
