pub mod abis;
pub mod aggregator;
pub mod config;
pub mod models;
pub mod oracle;
pub mod pricing;
pub mod reader;
pub mod scheduler;
pub mod utils;

pub use aggregator::TokenAggregator;
pub use config::Settings;
pub use models::{AggregateTokenView, ChainKey, ChainTokenSnapshot};
pub use oracle::{PriceOracle, ReferenceAsset};
pub use reader::{ChainReader, EvmChainReader, OsmosisChainReader};
pub use scheduler::RefreshScheduler;
