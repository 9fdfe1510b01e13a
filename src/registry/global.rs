//! Process-wide registry accessor
//!
//! Request handlers get the registry injected through server state. Code
//! outside a request (background jobs, schedulers) can reach the same
//! instance here once it has been installed at startup. Nothing is ever
//! constructed implicitly.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::error::RegistryError;
use super::store::Registry;

static GLOBAL: OnceCell<Arc<Registry>> = OnceCell::new();

/// Install `registry` as the process-wide instance
///
/// Installing the instance that is already installed is accepted; installing
/// a different one fails.
pub fn install_global(registry: Arc<Registry>) -> Result<(), RegistryError> {
    let installed = GLOBAL.get_or_init(|| Arc::clone(&registry));

    if Arc::ptr_eq(installed, &registry) {
        tracing::debug!("Global registry installed");
        Ok(())
    } else {
        Err(RegistryError::GlobalAlreadyInstalled)
    }
}

/// The process-wide registry, if one has been installed
pub fn global() -> Option<Arc<Registry>> {
    GLOBAL.get().cloned()
}
