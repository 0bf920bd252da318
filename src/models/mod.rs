pub mod chain;
pub mod snapshot;
pub mod view;

pub use chain::ChainKey;
pub use snapshot::{ChainTokenSnapshot, PoolReserves};
pub use view::AggregateTokenView;
