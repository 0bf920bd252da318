//! Per-chain snapshot readers.
//!
//! One generic reader per chain family: [`EvmChainReader`] covers every
//! configured EVM chain (Ethereum, Optimism, Polygon, Base) from a single
//! parameterized implementation, and [`OsmosisChainReader`] covers the
//! Cosmos side via LCD REST. Both produce a [`ChainTokenSnapshot`] and
//! contain their own failures: a reader never returns an error to the
//! aggregator, it returns an errored snapshot.

pub mod evm;
pub mod osmosis;

pub use evm::EvmChainReader;
pub use osmosis::OsmosisChainReader;

use thiserror::Error;

use crate::config::WalletSettings;
use crate::models::{ChainKey, ChainTokenSnapshot};

/// Structural errors from decoding a liquidity pool.
///
/// These indicate a misconfigured pool reference or an upstream protocol
/// change, not a transient network problem, so they get their own variants
/// instead of a generic message.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("pool has {0} assets, expected exactly 2")]
    InvalidPoolStructure(usize),
    #[error("token {0} not found in pool")]
    TokenNotFoundInPool(String),
}

/// A configured chain reader of either family.
pub enum ChainReader {
    Evm(EvmChainReader),
    Osmosis(OsmosisChainReader),
}

impl ChainReader {
    pub fn key(&self) -> ChainKey {
        match self {
            ChainReader::Evm(reader) => reader.key(),
            ChainReader::Osmosis(reader) => reader.key(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChainReader::Evm(reader) => reader.name(),
            ChainReader::Osmosis(reader) => reader.name(),
        }
    }

    /// Produce this chain's snapshot, using the wallet address that matches
    /// the chain family for the balance read.
    pub async fn snapshot(&self, wallet: &WalletSettings) -> ChainTokenSnapshot {
        match self {
            ChainReader::Evm(reader) => reader.snapshot(wallet.evm_address.as_deref()).await,
            ChainReader::Osmosis(reader) => {
                reader.snapshot(wallet.osmosis_address.as_deref()).await
            },
        }
    }
}
