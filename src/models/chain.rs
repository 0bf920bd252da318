use serde::{Serialize, Serializer};
use std::fmt;

/// Identifies one configured chain across both supported families.
///
/// EVM chains are keyed by their numeric chain id (Ethereum = 1,
/// Optimism = 10, Polygon = 137, Base = 8453); Cosmos chains by their
/// chain name string (e.g. "osmosis-1"). Used as the per-chain map key
/// in the aggregate view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainKey {
    Evm(u64),
    Cosmos(String),
}

// Serialized as the display string so the per-chain map keys stay plain.
impl Serialize for ChainKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKey::Evm(chain_id) => write!(f, "evm:{chain_id}"),
            ChainKey::Cosmos(chain_name) => write!(f, "cosmos:{chain_name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ChainKey::Evm(8453).to_string(), "evm:8453");
        assert_eq!(ChainKey::Cosmos("osmosis-1".to_string()).to_string(), "cosmos:osmosis-1");
    }
}
