use std::time::Duration;
use tracing::debug;

use crate::config::Provider;
use crate::error::ProviderError;
use crate::types::{ApiWalletHistory, Chain, SortOrder, TransactionPage};

/// Minimal client for the Moralis EVM wallet history endpoint.
pub struct MoralisClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl MoralisClient {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Builds a client from the `[provider]` config section; the key comes
    /// from the environment variable it names.
    pub fn from_config(provider: &Provider) -> Result<Self, ProviderError> {
        let api_key = provider
            .api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(provider.api_key_env.clone()))?;
        Self::new(&provider.api_url, &api_key, provider.request_timeout())
    }

    pub fn wallet_history_url(
        &self,
        address: &str,
        chain: Chain,
        order: SortOrder,
        limit: u32,
        cursor: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/{}?chain={}&order={}&limit={limit}",
            self.api_url,
            urlencoding::encode(address),
            chain.as_str(),
            order.as_str(),
        );
        if let Some(c) = cursor {
            url.push_str("&cursor=");
            url.push_str(&urlencoding::encode(c));
        }
        url
    }

    /// Fetches one page of wallet transactions and parses it into typed records.
    pub async fn fetch_wallet_history(
        &self,
        address: &str,
        chain: Chain,
        order: SortOrder,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<TransactionPage, ProviderError> {
        let url = self.wallet_history_url(address, chain, order, limit, cursor);
        debug!(%address, %chain, "fetching wallet history");

        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_wallet_history(&body)
    }
}

/// Parses a raw wallet history body. Any schema mismatch is a typed error.
pub fn parse_wallet_history(body: &str) -> Result<TransactionPage, ProviderError> {
    let history: ApiWalletHistory = serde_json::from_str(body)?;
    TransactionPage::try_from(history)
}
