use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

/// EVM network queried for wallet history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Eth,
    Polygon,
    Bsc,
    Base,
    Arbitrum,
    Fantom,
    Avalanche,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Self::Eth,
        Self::Polygon,
        Self::Bsc,
        Self::Base,
        Self::Arbitrum,
        Self::Fantom,
        Self::Avalanche,
    ];

    /// Provider chain identifier, also used as the report column prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eth => "eth",
            Self::Polygon => "polygon",
            Self::Bsc => "bsc",
            Self::Base => "base",
            Self::Arbitrum => "arbitrum",
            Self::Fantom => "fantom",
            Self::Avalanche => "avalanche",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown chain: {s}"))
    }
}

/// Chronological order requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One wallet transaction as seen by the profiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub timestamp: DateTime<Utc>,
    pub counterparty_address: String,
    pub counterparty_label: Option<String>,
    pub hash: Option<String>,
    pub block_number: Option<u64>,
}

impl TransactionRecord {
    /// Human-readable counterparty: the label when the provider knows one.
    pub fn counterparty(&self) -> &str {
        self.counterparty_label
            .as_deref()
            .unwrap_or(&self.counterparty_address)
    }
}

/// One provider response worth of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPage {
    pub records: Vec<TransactionRecord>,
    pub cursor: Option<String>,
}

/// Response body of the Moralis wallet history endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiWalletHistory {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub result: Vec<ApiWalletTransaction>,
}

/// Transaction entry from the Moralis wallet history endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiWalletTransaction {
    pub hash: Option<String>,
    pub block_number: Option<String>,
    pub block_timestamp: Option<String>,
    pub from_address: Option<String>,
    pub from_address_label: Option<String>,
    pub to_address: Option<String>,
    pub to_address_label: Option<String>,
    pub value: Option<String>,
}

impl TryFrom<ApiWalletTransaction> for TransactionRecord {
    type Error = ProviderError;

    fn try_from(tx: ApiWalletTransaction) -> Result<Self, Self::Error> {
        let hash_for_error = || tx.hash.clone().unwrap_or_else(|| "<no hash>".to_string());

        let Some(raw_ts) = tx.block_timestamp.as_deref() else {
            return Err(ProviderError::InvalidRecord {
                hash: hash_for_error(),
                reason: "missing block_timestamp".to_string(),
            });
        };
        let timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .map_err(|e| ProviderError::InvalidRecord {
                hash: hash_for_error(),
                reason: format!("bad block_timestamp {raw_ts:?}: {e}"),
            })?
            .with_timezone(&Utc);

        let counterparty_address = match tx.from_address.as_deref() {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => {
                return Err(ProviderError::InvalidRecord {
                    hash: hash_for_error(),
                    reason: "missing from_address".to_string(),
                })
            }
        };

        Ok(Self {
            timestamp,
            counterparty_address,
            counterparty_label: tx.from_address_label.filter(|l| !l.trim().is_empty()),
            block_number: tx.block_number.as_deref().and_then(|n| n.parse().ok()),
            hash: tx.hash,
        })
    }
}

impl TryFrom<ApiWalletHistory> for TransactionPage {
    type Error = ProviderError;

    fn try_from(body: ApiWalletHistory) -> Result<Self, Self::Error> {
        let records = body
            .result
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            records,
            cursor: body.cursor.filter(|c| !c.is_empty()),
        })
    }
}
