//! Client factory and the refcounted shared system.

use crate::error::{Result, ServientError};
use crate::mesh::client::MeshClient;
use crate::mesh::system::MeshSystem;
use crate::mesh::{MeshConfig, SCHEME};
use crate::protocol::{ProtocolClient, ProtocolClientFactory, RefCountResource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to a [`MeshSystem`] for one configuration identity.
///
/// The mesh server and any number of client factories retain the same
/// resource; the system is created on the first retain and torn down (every
/// node stopped) when the last holder releases.
pub fn shared_system(config: &MeshConfig) -> Arc<RefCountResource<Arc<MeshSystem>>> {
    let authority = config.authority.clone();
    Arc::new(RefCountResource::new(
        move || Ok(Arc::new(MeshSystem::new(authority.clone()))),
        |system: Arc<MeshSystem>| {
            system.stop_all();
            Ok(())
        },
    ))
}

/// The retained system of one factory or server between init and destroy.
pub(crate) struct SharedSystemSlot {
    shared: Arc<RefCountResource<Arc<MeshSystem>>>,
    system: Mutex<Option<Arc<MeshSystem>>>,
}

impl SharedSystemSlot {
    pub(crate) fn new(shared: Arc<RefCountResource<Arc<MeshSystem>>>) -> Self {
        Self {
            shared,
            system: Mutex::new(None),
        }
    }

    /// Retain the shared system; a no-op when already retained, which makes
    /// repeated init calls harmless.
    pub(crate) fn acquire(&self) -> Result<Arc<MeshSystem>> {
        let mut slot = self.system.lock();
        match &*slot {
            Some(system) => Ok(system.clone()),
            None => {
                let system = self.shared.retain()?;
                *slot = Some(system.clone());
                Ok(system)
            }
        }
    }

    /// Release the shared system; a no-op when not retained.
    pub(crate) fn drop_handle(&self) -> Result<()> {
        if self.system.lock().take().is_some() {
            self.shared.release()?;
        }
        Ok(())
    }

    /// The retained system, failing when the holder was never initialized.
    pub(crate) fn system(&self) -> Result<Arc<MeshSystem>> {
        self.system
            .lock()
            .clone()
            .ok_or_else(|| ServientError::Transport("mesh binding not initialized".into()))
    }
}

/// Factory producing [`MeshClient`]s for the `mesh` scheme.
pub struct MeshClientFactory {
    config: MeshConfig,
    slot: Arc<SharedSystemSlot>,
}

impl MeshClientFactory {
    /// Wire a factory to a shared system handle from [`shared_system`].
    pub fn new(config: MeshConfig, shared: Arc<RefCountResource<Arc<MeshSystem>>>) -> Self {
        Self {
            config,
            slot: Arc::new(SharedSystemSlot::new(shared)),
        }
    }
}

#[async_trait]
impl ProtocolClientFactory for MeshClientFactory {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn client(&self) -> Arc<dyn ProtocolClient> {
        Arc::new(MeshClient::new(self.config.clone(), self.slot.clone()))
    }

    async fn init(&self) -> Result<()> {
        self.slot.acquire()?;
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.slot.drop_handle()
    }
}
