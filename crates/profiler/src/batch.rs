use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::aggregator::{WalletAggregator, WalletRecord};
use crate::fetcher::TransactionSource;

/// Runs the wallet aggregator over a whole address list.
pub struct BatchOrchestrator<S> {
    aggregator: Arc<WalletAggregator<S>>,
    max_concurrent_wallets: usize,
    wallet_timeout: Option<Duration>,
}

impl<S> BatchOrchestrator<S>
where
    S: TransactionSource + Send + Sync + 'static,
{
    pub fn new(
        aggregator: WalletAggregator<S>,
        max_concurrent_wallets: usize,
        wallet_timeout: Option<Duration>,
    ) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            max_concurrent_wallets: max_concurrent_wallets.max(1),
            wallet_timeout,
        }
    }

    /// Profiles every address, at most `max_concurrent_wallets` at a time.
    /// Records come back in completion order, one per input address.
    pub async fn run(&self, addresses: &[String]) -> Vec<WalletRecord> {
        let total = addresses.len();
        let mut records = Vec::with_capacity(total);

        let mut in_flight = stream::iter(addresses.iter().cloned())
            .map(|address| self.process_wallet(address))
            .buffer_unordered(self.max_concurrent_wallets);

        while let Some(record) = in_flight.next().await {
            info!(
                address = %record.address,
                completed = records.len() + 1,
                total,
                "wallet processed"
            );
            records.push(record);
        }

        records
    }

    /// Aggregates one wallet in its own task so a panic or timeout is
    /// confined to that wallet's row.
    async fn process_wallet(&self, address: String) -> WalletRecord {
        let aggregator = Arc::clone(&self.aggregator);
        let task_address = address.clone();
        let mut handle = tokio::spawn(async move { aggregator.aggregate(&task_address).await });

        let joined = match self.wallet_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    handle.abort();
                    warn!(%address, timeout_secs = limit.as_secs(), "wallet timed out");
                    metrics::counter!("profiler_wallets_total", "outcome" => "timeout").increment(1);
                    return WalletRecord::unavailable(&address, self.aggregator.chains());
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(record) => {
                metrics::counter!("profiler_wallets_total", "outcome" => "ok").increment(1);
                record
            }
            Err(e) => {
                error!(%address, error = %e, "wallet aggregation failed");
                metrics::counter!("profiler_wallets_total", "outcome" => "failed").increment(1);
                WalletRecord::unavailable(&address, self.aggregator.chains())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::{settings, ts, tx, FakeSource};
    use crate::fetcher::ChainFetcher;
    use crate::report::ReportBuilder;
    use crate::summary::ChainStatus;
    use common::error::ProviderError;
    use common::types::{Chain, SortOrder, TransactionPage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator(source: FakeSource, max_concurrent: usize) -> BatchOrchestrator<FakeSource> {
        let aggregator =
            WalletAggregator::new(ChainFetcher::new(source, settings(2)), Chain::ALL.to_vec());
        BatchOrchestrator::new(aggregator, max_concurrent, None)
    }

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_string()).collect()
    }

    #[tokio::test]
    async fn test_two_wallet_scenario_end_to_end() {
        // 0xB: eth at day 20, polygon at day 5; 0xA: eth at day 25.
        let source = FakeSource::default()
            .with_history("0xA", Chain::Eth, vec![tx(25, "0xa_funder", None)])
            .with_history("0xB", Chain::Eth, vec![tx(20, "0xb_eth", None)])
            .with_history("0xB", Chain::Polygon, vec![tx(5, "0xb_poly", Some("Poly Faucet"))]);
        let records = orchestrator(source, 5).run(&addrs(&["0xA", "0xB"])).await;
        assert_eq!(records.len(), 2);

        let report = ReportBuilder::new(Chain::ALL.to_vec()).build(records);
        let rows = &report.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, "0xB");
        assert_eq!(rows[1].address, "0xA");
        assert_eq!(rows[0].registration_date, Some(ts(5).naive_utc()));
        assert_eq!(rows[0].funding_source.as_deref(), Some("Poly Faucet"));
        assert_eq!(rows[1].registration_date, Some(ts(25).naive_utc()));

        let counts = |row: usize| -> Vec<(Chain, usize)> {
            rows[row]
                .chains
                .iter()
                .map(|c| (c.chain, c.transaction_count))
                .collect()
        };
        for (chain, count) in counts(1) {
            assert_eq!(count, usize::from(chain == Chain::Eth), "0xA {chain}");
        }
        for (chain, count) in counts(0) {
            let expected = usize::from(matches!(chain, Chain::Eth | Chain::Polygon));
            assert_eq!(count, expected, "0xB {chain}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_chain_is_isolated() {
        let source = FakeSource::default()
            .with_history("0xA", Chain::Eth, vec![tx(3, "0xf", None)])
            .with_history("0xA", Chain::Polygon, vec![tx(8, "0xg", None)])
            .failing_on("0xA", Chain::Eth)
            .with_history("0xB", Chain::Bsc, vec![tx(1, "0xh", None)]);
        let records = orchestrator(source, 2)
            .run(&addrs(&["0xA", "0xB", "0xC"]))
            .await;
        assert_eq!(records.len(), 3);

        let a = records.iter().find(|r| r.address == "0xA").unwrap();
        assert_eq!(a.summary(Chain::Eth).unwrap().status, ChainStatus::Unavailable);
        assert_eq!(a.summary(Chain::Polygon).unwrap().transaction_count(), 1);
        assert_eq!(a.registration_date, Some(ts(8)));
        assert_eq!(a.funding_source.as_deref(), Some("0xg"));

        let b = records.iter().find(|r| r.address == "0xB").unwrap();
        assert_eq!(b.registration_date, Some(ts(1)));
        assert!(records.iter().any(|r| r.address == "0xC"));
    }

    /// Tracks how many wallets are inside the provider at once.
    struct GaugeSource {
        current: AtomicUsize,
        peak: Arc<AtomicUsize>,
    }

    impl TransactionSource for GaugeSource {
        async fn fetch_transactions(
            &self,
            _address: &str,
            chain: Chain,
            _order: SortOrder,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<TransactionPage, ProviderError> {
            // Only the eth fetch is counted so one wallet counts once.
            if chain == Chain::Eth {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(TransactionPage::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_concurrency_is_bounded() {
        let peak = Arc::new(AtomicUsize::new(0));
        let source = GaugeSource {
            current: AtomicUsize::new(0),
            peak: Arc::clone(&peak),
        };
        let aggregator =
            WalletAggregator::new(ChainFetcher::new(source, settings(0)), Chain::ALL.to_vec());
        let orchestrator = BatchOrchestrator::new(aggregator, 3, None);

        let addresses: Vec<String> = (0..10).map(|i| format!("0x{i}")).collect();
        let records = orchestrator.run(&addresses).await;

        assert_eq!(records.len(), 10);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak >= 2, "wallets never overlapped");
    }

    struct StallingSource;

    impl TransactionSource for StallingSource {
        async fn fetch_transactions(
            &self,
            address: &str,
            _chain: Chain,
            _order: SortOrder,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<TransactionPage, ProviderError> {
            if address == "0xslow" {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(TransactionPage {
                records: vec![tx(2, "0xf", None)],
                cursor: None,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_timeout_yields_placeholder_row() {
        let aggregator = WalletAggregator::new(
            ChainFetcher::new(StallingSource, settings(0)),
            vec![Chain::Eth, Chain::Base],
        );
        let orchestrator = BatchOrchestrator::new(aggregator, 2, Some(Duration::from_secs(60)));

        let records = orchestrator.run(&addrs(&["0xslow", "0xfast"])).await;
        assert_eq!(records.len(), 2);

        let slow = records.iter().find(|r| r.address == "0xslow").unwrap();
        assert_eq!(slow.unavailable_chains(), 2);
        assert_eq!(slow.funding_source, None);

        let fast = records.iter().find(|r| r.address == "0xfast").unwrap();
        assert_eq!(fast.registration_date, Some(ts(2)));
    }

    struct PanickingSource;

    impl TransactionSource for PanickingSource {
        async fn fetch_transactions(
            &self,
            address: &str,
            _chain: Chain,
            _order: SortOrder,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<TransactionPage, ProviderError> {
            assert_ne!(address, "0xboom", "provider blew up");
            Ok(TransactionPage::default())
        }
    }

    #[tokio::test]
    async fn test_panicking_chain_tasks_do_not_drop_the_wallet() {
        let aggregator = WalletAggregator::new(
            ChainFetcher::new(PanickingSource, settings(0)),
            vec![Chain::Eth, Chain::Polygon],
        );
        let orchestrator = BatchOrchestrator::new(aggregator, 2, None);

        let records = orchestrator.run(&addrs(&["0xboom", "0xok"])).await;
        assert_eq!(records.len(), 2);
        let boom = records.iter().find(|r| r.address == "0xboom").unwrap();
        assert_eq!(boom.unavailable_chains(), 2);
        let ok = records.iter().find(|r| r.address == "0xok").unwrap();
        assert_eq!(ok.unavailable_chains(), 0);
    }
}
