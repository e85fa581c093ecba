//! Process-wide transfer engine registry
//!
//! Engines are registered by name as factories taking the [`TransferConfig`] of the
//! uploader being built. Registration is idempotent: the first factory registered
//! under a name wins and later attempts are refused, so repeated initialization
//! never replaces an engine other uploaders already resolved.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::TransferEngine;
use super::http::{ENGINE_NAME, HttpTransferEngine};
use crate::config::TransferConfig;
use crate::error::{Error, Result};

/// Builds an engine from the transfer settings of an uploader
pub type EngineFactory =
    Arc<dyn Fn(&TransferConfig) -> Result<Arc<dyn TransferEngine>> + Send + Sync>;

static ENGINES: OnceLock<RwLock<HashMap<String, EngineFactory>>> = OnceLock::new();

fn engines() -> &'static RwLock<HashMap<String, EngineFactory>> {
    ENGINES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register `factory` under `name`
///
/// Returns `false` and leaves the registry untouched if the name is already taken.
pub fn register_engine(name: impl Into<String>, factory: EngineFactory) -> bool {
    let name = name.into();
    let mut engines = engines().write().unwrap_or_else(PoisonError::into_inner);
    if engines.contains_key(&name) {
        tracing::debug!(engine = %name, "Transfer engine already registered");
        return false;
    }
    tracing::debug!(engine = %name, "Registered transfer engine");
    engines.insert(name, factory);
    true
}

/// Install the built-in engines (safe to call any number of times)
pub fn register_default_engines() {
    register_engine(
        ENGINE_NAME,
        Arc::new(|transfer: &TransferConfig| {
            let engine: Arc<dyn TransferEngine> = Arc::new(HttpTransferEngine::new(transfer)?);
            Ok(engine)
        }),
    );
}

/// Whether an engine is registered under `name`
pub fn is_registered(name: &str) -> bool {
    engines()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(name)
}

/// Build the engine registered under `name`
///
/// # Errors
///
/// Returns [`Error::UnknownEngine`] if nothing is registered under `name`, or the
/// factory's error if it can't build the engine.
pub fn create_engine(name: &str, transfer: &TransferConfig) -> Result<Arc<dyn TransferEngine>> {
    let factory = engines()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownEngine(name.to_string()))?;
    factory(transfer)
}
