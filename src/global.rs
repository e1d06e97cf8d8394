//! The process-wide bridge slot.
//!
//! Generated glue that cannot thread a [`Bridge`] through its call sites
//! installs one here at startup and tears it down at exit.

use std::sync::Arc;

use crossbind_core::BridgeError;
use parking_lot::RwLock;

use crate::bridge::Bridge;

static BRIDGE: RwLock<Option<Arc<Bridge>>> = parking_lot::const_rwlock(None);

/// Install `bridge` as the process-wide bridge, returning the previous one.
pub fn install(bridge: Arc<Bridge>) -> Option<Arc<Bridge>> {
    let previous = BRIDGE.write().replace(bridge);
    if previous.is_some() {
        log::warn!("replacing the installed bridge");
    } else {
        log::debug!("bridge installed");
    }
    previous
}

/// The installed bridge.
///
/// # Errors
///
/// [`BridgeError::NotInitialized`] before [`install`] or after [`teardown`].
pub fn bridge() -> Result<Arc<Bridge>, BridgeError> {
    BRIDGE.read().clone().ok_or(BridgeError::NotInitialized)
}

/// Remove the installed bridge. Wrappers still alive keep their own
/// references and release normally.
pub fn teardown() -> Option<Arc<Bridge>> {
    let previous = BRIDGE.write().take();
    if previous.is_some() {
        log::debug!("bridge torn down");
    }
    previous
}

pub fn is_initialized() -> bool {
    BRIDGE.read().is_some()
}
