//! Process-wide emitter handle.
//!
//! Hosts that want one shared event pipeline install it here once at
//! startup and tear it down once at shutdown. The handle is an explicit
//! slot, not hidden state: double-install and use-before-install are
//! surfaced as [`Error::Lifecycle`], and tests can ignore this module
//! entirely and construct their own isolated [`EventEmitter`].

use crate::emitter::{EmitterConfig, EventEmitter};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

static GLOBAL_EMITTER: Lazy<Mutex<Option<Arc<EventEmitter>>>> = Lazy::new(|| Mutex::new(None));

/// Install the process-wide emitter and start its worker.
///
/// Must run inside a tokio runtime when `config.async_processing` is set.
///
/// # Errors
///
/// [`Error::Lifecycle`] if an emitter is already installed.
pub fn install_global_emitter(config: EmitterConfig) -> Result<Arc<EventEmitter>> {
    let mut slot = GLOBAL_EMITTER.lock().unwrap();
    if slot.is_some() {
        return Err(Error::lifecycle("global emitter already installed"));
    }
    let emitter = Arc::new(EventEmitter::new(config));
    emitter.start();
    *slot = Some(emitter.clone());
    Ok(emitter)
}

/// Fetch the installed emitter.
///
/// # Errors
///
/// [`Error::Lifecycle`] if nothing is installed.
pub fn global_emitter() -> Result<Arc<EventEmitter>> {
    GLOBAL_EMITTER
        .lock()
        .unwrap()
        .clone()
        .ok_or_else(|| Error::lifecycle("global emitter is not installed"))
}

/// Stop and uninstall the process-wide emitter, draining its queue.
///
/// Subscriptions die with the emitter; unsubscribing afterwards is a no-op
/// on whatever handle the caller still holds.
///
/// # Errors
///
/// [`Error::Lifecycle`] if nothing is installed.
pub async fn teardown_global_emitter() -> Result<()> {
    let emitter = GLOBAL_EMITTER
        .lock()
        .unwrap()
        .take()
        .ok_or_else(|| Error::lifecycle("global emitter is not installed"))?;
    emitter.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test drives the whole lifecycle: the slot is process-wide, so
    // splitting these assertions across tests would race under the
    // parallel test runner.
    #[tokio::test]
    async fn test_global_emitter_lifecycle() {
        assert!(matches!(global_emitter(), Err(Error::Lifecycle(_))));
        assert!(matches!(
            teardown_global_emitter().await,
            Err(Error::Lifecycle(_))
        ));

        let installed = install_global_emitter(EmitterConfig::default()).unwrap();
        assert!(matches!(
            install_global_emitter(EmitterConfig::default()),
            Err(Error::Lifecycle(_))
        ));

        let fetched = global_emitter().unwrap();
        assert!(Arc::ptr_eq(&installed, &fetched));

        teardown_global_emitter().await.unwrap();
        assert!(matches!(global_emitter(), Err(Error::Lifecycle(_))));
    }
}
