pub mod config;
pub mod config_loader;
pub mod validation;

pub use config::{
    AppConfig, BaselinePolicy, ChainColumns, DistressBand, EngineConfig, InputCells,
    LoggingConfig, SignalMarkers, StoreConfig, StoreKind, TerminalColumns, TerminalLayout,
    UnsetPremiumPolicy,
};
pub use config_loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use validation::{validate, validate_engine, ConfigError};
