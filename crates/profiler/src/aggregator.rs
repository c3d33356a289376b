use chrono::{DateTime, Utc};
use common::types::{Chain, TransactionRecord};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::fetcher::{ChainFetcher, TransactionSource};
use crate::summary::{summarize, ChainStatus, ChainSummary};

/// Cross-chain profile of one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRecord {
    pub address: String,
    /// One entry per configured chain, in configuration order.
    pub chains: Vec<(Chain, ChainSummary)>,
    pub funding_source: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
}

impl WalletRecord {
    /// Record with every chain unavailable and nothing attributed.
    pub fn unavailable(address: &str, chains: &[Chain]) -> Self {
        Self {
            address: address.to_string(),
            chains: chains
                .iter()
                .map(|&c| (c, ChainSummary::unavailable()))
                .collect(),
            funding_source: None,
            registration_date: None,
        }
    }

    pub fn summary(&self, chain: Chain) -> Option<&ChainSummary> {
        self.chains
            .iter()
            .find(|(c, _)| *c == chain)
            .map(|(_, s)| s)
    }

    pub fn unavailable_chains(&self) -> usize {
        self.chains
            .iter()
            .filter(|(_, s)| s.status == ChainStatus::Unavailable)
            .count()
    }
}

/// Running minimum over chains. Ties on timestamp go to the chain listed
/// first in the configuration, so attribution does not depend on which
/// fetch finished first.
struct Earliest {
    timestamp: DateTime<Utc>,
    position: usize,
    record: TransactionRecord,
}

impl Earliest {
    fn offer(best: &mut Option<Self>, position: usize, record: &TransactionRecord) {
        let replace = match best {
            None => true,
            Some(b) => (record.timestamp, position) < (b.timestamp, b.position),
        };
        if replace {
            *best = Some(Self {
                timestamp: record.timestamp,
                position,
                record: record.clone(),
            });
        }
    }
}

pub struct WalletAggregator<S> {
    fetcher: Arc<ChainFetcher<S>>,
    chains: Vec<Chain>,
}

impl<S> WalletAggregator<S>
where
    S: TransactionSource + Send + Sync + 'static,
{
    pub fn new(fetcher: ChainFetcher<S>, chains: Vec<Chain>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            chains,
        }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Fetches every configured chain for `address` concurrently and folds
    /// the summaries as they complete.
    pub async fn aggregate(&self, address: &str) -> WalletRecord {
        let mut record = WalletRecord::unavailable(address, &self.chains);

        let mut tasks = JoinSet::new();
        for (position, &chain) in self.chains.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let address = address.to_string();
            tasks.spawn(async move {
                let outcome = fetcher.fetch(&address, chain).await;
                debug!(
                    %address,
                    %chain,
                    failed_attempts = outcome.failed_attempts(),
                    "chain fetch finished"
                );
                (position, summarize(&outcome))
            });
        }

        let mut earliest: Option<Earliest> = None;
        while let Some(joined) = tasks.join_next().await {
            let (position, summary) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // The chain keeps its unavailable placeholder.
                    error!(%address, error = %e, "chain task failed");
                    continue;
                }
            };
            if let Some(first) = summary.first_transaction() {
                Earliest::offer(&mut earliest, position, first);
            }
            record.chains[position].1 = summary;
        }

        record.funding_source = earliest
            .as_ref()
            .map(|e| e.record.counterparty().to_string());
        record.registration_date = earliest.as_ref().map(|e| e.timestamp);

        debug!(
            %address,
            registration_date = ?record.registration_date,
            funding_source = ?record.funding_source,
            funding_chain = ?earliest.as_ref().map(|e| self.chains[e.position]),
            funding_tx = ?earliest.and_then(|e| e.record.hash),
            unavailable_chains = record.unavailable_chains(),
            "wallet aggregated"
        );
        record
    }
}
