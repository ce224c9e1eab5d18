use std::{collections::BTreeSet, fmt, sync::Arc};

use quest_model::{Address, Decimal};
use reqwest::{IntoUrl, Url};
use serde::{Deserialize, Serialize};

use super::{ChainActivityReader, Network};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

enum Path {
    Deposits,
    Swaps,
}

impl Path {
    fn to_segment(&self) -> &str {
        match self {
            Self::Deposits => "deposits",
            Self::Swaps => "swaps",
        }
    }
}

/// Response of the activity endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// USD value.
    #[serde(with = "rust_decimal::serde::str")]
    pub usd: Decimal,
}

/// Client of a chain-data indexer exposing
/// `GET {base}/v1/{network}/{address}/{deposits|swaps}`.
#[derive(Clone)]
pub struct IndexerClient {
    base: Url,
    client: reqwest::Client,
    api_key: Option<Arc<str>>,
    networks: Arc<BTreeSet<Network>>,
}

impl fmt::Debug for IndexerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerClient")
            .field("base", &self.base)
            .field("networks", &self.networks)
            .finish_non_exhaustive()
    }
}

impl IndexerClient {
    /// Create a new [`IndexerClient`] with the given base URL.
    pub fn try_new(
        base: impl IntoUrl,
        api_key: Option<String>,
        networks: impl IntoIterator<Item = Network>,
    ) -> crate::Result<Self> {
        Ok(Self {
            base: base.into_url()?,
            client: reqwest::Client::new(),
            api_key: api_key.map(Arc::from),
            networks: Arc::new(networks.into_iter().collect()),
        })
    }

    /// Returns whether the network is supported.
    pub fn is_supported(&self, network: Network) -> bool {
        self.networks.contains(&network)
    }

    fn url(&self, network: Network, address: &Address, path: Path) -> crate::Result<Url> {
        let url = self.base.join(&format!(
            "v1/{network}/{address}/{}",
            path.to_segment()
        ))?;
        Ok(url)
    }

    async fn get(&self, network: Network, address: &Address, path: Path) -> crate::Result<Decimal> {
        if !self.is_supported(network) {
            return Err(crate::Error::UnsupportedNetwork(network));
        }
        let mut request = self.client.get(self.url(network, address, path)?);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header(API_KEY_HEADER, key);
        }
        let response: ActivityResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.usd)
    }
}

impl ChainActivityReader for IndexerClient {
    async fn deposits_usd(&self, address: &Address, network: Network) -> crate::Result<Decimal> {
        self.get(network, address, Path::Deposits).await
    }

    async fn swaps_usd(&self, address: &Address, network: Network) -> crate::Result<Decimal> {
        self.get(network, address, Path::Swaps).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_layout() {
        let client = IndexerClient::try_new(
            "https://indexer.example.com/api/",
            None,
            [Network::Ethereum],
        )
        .unwrap();
        let address: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        assert_eq!(
            client
                .url(Network::Ethereum, &address, Path::Swaps)
                .unwrap()
                .as_str(),
            "https://indexer.example.com/api/v1/ethereum/0x00000000000000000000000000000000000000aa/swaps"
        );
    }

    #[tokio::test]
    async fn unsupported_network_is_an_error() {
        let client =
            IndexerClient::try_new("http://127.0.0.1:1/", None, [Network::Ethereum]).unwrap();
        let address: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let err = client
            .deposits_usd(&address, Network::Bsc)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::UnsupportedNetwork(Network::Bsc)));
    }

    #[test]
    fn parse_response() {
        let response: ActivityResponse = serde_json::from_str(r#"{"usd":"12.50"}"#).unwrap();
        assert_eq!(response.usd, Decimal::new(1250, 2));
    }
}
