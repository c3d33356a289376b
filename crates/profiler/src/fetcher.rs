use common::error::ProviderError;
use common::moralis::MoralisClient;
use common::types::{Chain, SortOrder, TransactionPage, TransactionRecord};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Source of per-chain wallet transaction history.
pub trait TransactionSource {
    fn fetch_transactions(
        &self,
        address: &str,
        chain: Chain,
        order: SortOrder,
        limit: u32,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<TransactionPage, ProviderError>> + Send;
}

impl TransactionSource for MoralisClient {
    async fn fetch_transactions(
        &self,
        address: &str,
        chain: Chain,
        order: SortOrder,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<TransactionPage, ProviderError> {
        let start = Instant::now();
        let res = self
            .fetch_wallet_history(address, chain, order, limit, cursor)
            .await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("profiler_api_latency_ms", "chain" => chain.as_str()).record(ms);
        match res {
            Ok(page) => {
                metrics::counter!("profiler_api_requests_total", "chain" => chain.as_str(), "status" => "ok").increment(1);
                Ok(page)
            }
            Err(e) => {
                metrics::counter!("profiler_api_requests_total", "chain" => chain.as_str(), "status" => "error").increment(1);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub order: SortOrder,
    pub page_limit: u32,
    pub max_pages: u32,
    /// Retries after the first attempt of each page request.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&common::config::Fetch> for FetchSettings {
    fn from(cfg: &common::config::Fetch) -> Self {
        Self {
            order: cfg.order,
            page_limit: cfg.page_limit,
            max_pages: cfg.max_pages,
            max_retries: cfg.max_retries,
            backoff: cfg.backoff(),
        }
    }
}

/// Result of fetching one (address, chain) history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched {
        records: Vec<TransactionRecord>,
        failed_attempts: u32,
    },
    /// Retry budget exhausted; downstream treats this as zero activity.
    Unavailable { failed_attempts: u32 },
}

impl FetchOutcome {
    pub fn failed_attempts(&self) -> u32 {
        match self {
            Self::Fetched {
                failed_attempts, ..
            }
            | Self::Unavailable { failed_attempts } => *failed_attempts,
        }
    }
}

pub struct ChainFetcher<S> {
    source: S,
    settings: FetchSettings,
}

impl<S: TransactionSource + Sync> ChainFetcher<S> {
    pub fn new(source: S, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    /// Fetches the history of `address` on `chain`, following the provider
    /// cursor for up to `max_pages` pages. Provider errors never escape: a
    /// page that fails every attempt turns the whole chain `Unavailable`.
    pub async fn fetch(&self, address: &str, chain: Chain) -> FetchOutcome {
        if address.is_empty() {
            warn!(%chain, "skipping fetch for empty address");
            return FetchOutcome::Unavailable { failed_attempts: 0 };
        }

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut failed_attempts = 0;

        for page_no in 0..self.settings.max_pages {
            let Some(page) = self
                .fetch_page_with_retry(address, chain, cursor.as_deref(), &mut failed_attempts)
                .await
            else {
                metrics::counter!("profiler_chains_unavailable_total", "chain" => chain.as_str())
                    .increment(1);
                return FetchOutcome::Unavailable { failed_attempts };
            };

            debug!(%address, %chain, page_no, count = page.records.len(), "fetched page");
            records.extend(page.records);
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        FetchOutcome::Fetched {
            records,
            failed_attempts,
        }
    }

    async fn fetch_page_with_retry(
        &self,
        address: &str,
        chain: Chain,
        cursor: Option<&str>,
        failed_attempts: &mut u32,
    ) -> Option<TransactionPage> {
        let max_attempts = self.settings.max_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let res = self
                .source
                .fetch_transactions(
                    address,
                    chain,
                    self.settings.order,
                    self.settings.page_limit,
                    cursor,
                )
                .await;

            match res {
                Ok(page) => return Some(page),
                Err(e) => {
                    *failed_attempts += 1;
                    metrics::counter!(
                        "profiler_fetch_failures_total",
                        "chain" => chain.as_str(),
                        "kind" => e.kind()
                    )
                    .increment(1);
                    warn!(
                        %address,
                        %chain,
                        attempt,
                        max_attempts,
                        error = %e,
                        "error fetching wallet history"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.settings.backoff).await;
                    }
                }
            }
        }

        None
    }
}
