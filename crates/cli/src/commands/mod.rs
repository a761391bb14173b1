//! CLI commands for the straddle engine.

pub mod check_config;
pub mod locate;
pub mod run;

pub use check_config::{run_check_config, CheckConfigArgs};
pub use locate::{run_locate, LocateArgs};
pub use run::{run_session, RunArgs};

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use straddle_core::{AppConfig, ConfigLoader, StoreConfig, StoreKind};
use straddle_terminal::{JsonFileStore, MemoryStore, QuoteStore, TradeTerminal};

/// Loads the config file with an optional `Config.<profile>.toml` overlay.
pub(crate) fn load_config(path: &str, profile: Option<&str>) -> Result<AppConfig> {
    match profile {
        Some(profile) => ConfigLoader::load_with_profile(path, profile),
        None => ConfigLoader::load(path),
    }
}

/// Opened terminal plus the paper store behind it, if any.
pub(crate) struct OpenedTerminal {
    pub terminal: TradeTerminal,
    pub paper: Option<Arc<MemoryStore>>,
}

pub(crate) async fn open_terminal(config: &AppConfig, kind: StoreKind) -> Result<OpenedTerminal> {
    let StoreConfig { path, .. } = &config.store;
    let (store, paper): (Arc<dyn QuoteStore>, Option<Arc<MemoryStore>>) = match kind {
        StoreKind::JsonFile => {
            let store = JsonFileStore::new(path);
            info!(
                snapshot = %store.snapshot_path().display(),
                instructions = %store.instructions_path().display(),
                "Using JSON file terminal"
            );
            (Arc::new(store), None)
        }
        StoreKind::Paper => {
            let store = Arc::new(
                MemoryStore::load(path)
                    .await
                    .with_context(|| format!("Failed to load paper snapshot {}", path.display()))?,
            );
            (store.clone(), Some(store))
        }
    };

    let terminal = TradeTerminal::new(store, config.terminal.clone())
        .context("Invalid terminal layout")?;
    Ok(OpenedTerminal { terminal, paper })
}
