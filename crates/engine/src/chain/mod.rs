/// Chain-data indexer client.
pub mod indexer;

use std::{future::Future, time::Duration};

use futures_util::future::join_all;
use quest_model::{Address, Decimal, TaskKind};
use serde::{Deserialize, Serialize};

pub use indexer::IndexerClient;

/// Supported networks.
#[derive(
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Ethereum mainnet.
    Ethereum,
    /// BNB Smart Chain.
    Bsc,
    /// Polygon PoS.
    Polygon,
    /// Arbitrum One.
    Arbitrum,
}

/// Reads the USD value of on-chain activity of an address.
///
/// Implementations must return [`Error::UnsupportedNetwork`](crate::Error::UnsupportedNetwork)
/// for networks they cannot read, never zero.
pub trait ChainActivityReader: Send + Sync {
    /// Total USD value deposited to `address` on `network`.
    fn deposits_usd(
        &self,
        address: &Address,
        network: Network,
    ) -> impl Future<Output = crate::Result<Decimal>> + Send;

    /// Total USD value swapped by `address` on `network`.
    fn swaps_usd(
        &self,
        address: &Address,
        network: Network,
    ) -> impl Future<Output = crate::Result<Decimal>> + Send;
}

/// Aggregated activity over networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Sum over the networks that were read successfully.
    pub total: Decimal,
    /// Networks that failed or timed out.
    pub failed: Vec<Network>,
}

impl Aggregate {
    /// Returns whether every network was read.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

async fn read<R: ChainActivityReader>(
    reader: &R,
    task: TaskKind,
    address: &Address,
    network: Network,
) -> crate::Result<Decimal> {
    let value = match task {
        TaskKind::Deposit => reader.deposits_usd(address, network).await?,
        TaskKind::Swap => reader.swaps_usd(address, network).await?,
    };
    if value.is_sign_negative() {
        return Err(crate::Error::transport(format!(
            "negative activity value: {value}"
        )));
    }
    Ok(value)
}

/// Sum the activity of `address` for `task` over `networks`.
///
/// Networks are read concurrently, each bounded by `timeout`. A failing
/// network contributes zero and is reported in [`Aggregate::failed`].
pub async fn aggregate<R: ChainActivityReader>(
    reader: &R,
    task: TaskKind,
    address: &Address,
    networks: &[Network],
    timeout: Duration,
) -> Aggregate {
    let reads = networks.iter().map(|network| async move {
        let result = tokio::time::timeout(timeout, read(reader, task, address, *network))
            .await
            .unwrap_or_else(|_| Err(crate::Error::Timeout));
        (*network, result)
    });

    let mut aggregate = Aggregate::default();
    for (network, result) in join_all(reads).await {
        match result {
            Ok(value) => aggregate.total += value,
            Err(err) => {
                tracing::warn!(%network, %address, %task, %err, "failed to read activity");
                aggregate.failed.push(network);
            }
        }
    }
    aggregate
}
