mod config;

pub use config::{
    EvmChainSettings, OracleSettings, OsmosisSettings, RefreshSettings, Settings, SupplySettings,
    WalletSettings,
};
