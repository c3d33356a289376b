use chrono::{DateTime, Utc};
use common::types::TransactionRecord;

use crate::fetcher::FetchOutcome;

/// Whether the provider answered for this chain at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Fetched,
    Unavailable,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChainActivity {
    transaction_count: usize,
    first_transaction: TransactionRecord,
    last_transaction_timestamp: DateTime<Utc>,
}

/// Per (address, chain) reduction of a transaction history.
///
/// Count, first/last timestamps and the first record are either all present
/// or all absent; the single optional `activity` makes the mixed states
/// unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub status: ChainStatus,
    activity: Option<ChainActivity>,
}

impl ChainSummary {
    pub fn unavailable() -> Self {
        Self {
            status: ChainStatus::Unavailable,
            activity: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            status: ChainStatus::Fetched,
            activity: None,
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.activity.as_ref().map_or(0, |a| a.transaction_count)
    }

    pub fn first_transaction(&self) -> Option<&TransactionRecord> {
        self.activity.as_ref().map(|a| &a.first_transaction)
    }

    pub fn first_transaction_timestamp(&self) -> Option<DateTime<Utc>> {
        self.first_transaction().map(|t| t.timestamp)
    }

    pub fn last_transaction_timestamp(&self) -> Option<DateTime<Utc>> {
        self.activity.as_ref().map(|a| a.last_transaction_timestamp)
    }
}

/// Reduces a fetch outcome to its summary.
///
/// The earliest record is the first transaction (earlier position wins a
/// timestamp tie), which is the head of the page whenever the provider
/// returns ascending order as asked.
pub fn summarize(outcome: &FetchOutcome) -> ChainSummary {
    let FetchOutcome::Fetched { records, .. } = outcome else {
        return ChainSummary::unavailable();
    };
    let Some(first) = records.iter().min_by_key(|r| r.timestamp) else {
        return ChainSummary::empty();
    };
    let last = records
        .iter()
        .map(|r| r.timestamp)
        .max()
        .unwrap_or(first.timestamp);

    ChainSummary {
        status: ChainStatus::Fetched,
        activity: Some(ChainActivity {
            transaction_count: records.len(),
            first_transaction: first.clone(),
            last_transaction_timestamp: last,
        }),
    }
}
