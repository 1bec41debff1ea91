// registry.rs — Process-wide transport registry.
//
// Applications register the transports they send through and look them up
// here at call time. An installed interceptor swaps each registered
// transport for a wrapped one and puts the captured originals back on
// uninstall. One lock guards both the active set and the installation
// record, so install/uninstall/register never interleave.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::InterceptorError;
use crate::transport::{AsyncTransport, ConnectionPool, SyncTransport};

/// One slot per transport kind.
#[derive(Clone, Default)]
pub struct TransportSet {
    pub sync: Option<Arc<dyn SyncTransport>>,
    pub asynchronous: Option<Arc<dyn AsyncTransport>>,
    pub pool: Option<Arc<dyn ConnectionPool>>,
}

impl TransportSet {
    const EMPTY: TransportSet = TransportSet {
        sync: None,
        asynchronous: None,
        pool: None,
    };

    /// Names of the populated slots, for logging.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.sync.is_some() {
            kinds.push("sync");
        }
        if self.asynchronous.is_some() {
            kinds.push("async");
        }
        if self.pool.is_some() {
            kinds.push("pool");
        }
        kinds
    }
}

struct Installation {
    owner: u64,
    originals: TransportSet,
}

struct Registry {
    active: TransportSet,
    installation: Option<Installation>,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    active: TransportSet::EMPTY,
    installation: None,
});

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unlocked(registry: &Registry) -> Result<(), InterceptorError> {
    if registry.installation.is_some() {
        Err(InterceptorError::RegistryLocked)
    } else {
        Ok(())
    }
}

pub fn register_sync(transport: Arc<dyn SyncTransport>) -> Result<(), InterceptorError> {
    let mut registry = registry();
    unlocked(&registry)?;
    registry.active.sync = Some(transport);
    Ok(())
}

pub fn register_async(transport: Arc<dyn AsyncTransport>) -> Result<(), InterceptorError> {
    let mut registry = registry();
    unlocked(&registry)?;
    registry.active.asynchronous = Some(transport);
    Ok(())
}

pub fn register_pool(pool: Arc<dyn ConnectionPool>) -> Result<(), InterceptorError> {
    let mut registry = registry();
    unlocked(&registry)?;
    registry.active.pool = Some(pool);
    Ok(())
}

/// Remove every registered transport.
pub fn clear_transports() -> Result<(), InterceptorError> {
    let mut registry = registry();
    unlocked(&registry)?;
    registry.active = TransportSet::default();
    Ok(())
}

/// The transport to send through right now (wrapped while installed).
pub fn sync_transport() -> Option<Arc<dyn SyncTransport>> {
    registry().active.sync.clone()
}

pub fn async_transport() -> Option<Arc<dyn AsyncTransport>> {
    registry().active.asynchronous.clone()
}

pub fn pool() -> Option<Arc<dyn ConnectionPool>> {
    registry().active.pool.clone()
}

/// Whether any interceptor is installed.
pub fn is_installed() -> bool {
    registry().installation.is_some()
}

pub(crate) fn is_installed_by(owner: u64) -> bool {
    registry()
        .installation
        .as_ref()
        .is_some_and(|i| i.owner == owner)
}

/// Capture the active set, replace it with `wrap(originals)`, and record
/// `owner` as the sole installation. Returns the kinds that were wrapped.
pub(crate) fn install(
    owner: u64,
    wrap: impl FnOnce(&TransportSet) -> TransportSet,
) -> Result<Vec<&'static str>, InterceptorError> {
    let mut registry = registry();
    if registry.installation.is_some() {
        return Err(InterceptorError::AlreadyInstalled);
    }
    let originals = registry.active.clone();
    registry.active = wrap(&originals);
    let kinds = originals.kinds();
    registry.installation = Some(Installation { owner, originals });
    Ok(kinds)
}

/// Restore exactly the transports captured by `owner`'s install.
pub(crate) fn uninstall(owner: u64) -> Result<(), InterceptorError> {
    let mut registry = registry();
    match registry.installation.take() {
        Some(installation) if installation.owner == owner => {
            registry.active = installation.originals;
            Ok(())
        }
        other => {
            registry.installation = other;
            Err(InterceptorError::NotInstalled)
        }
    }
}
