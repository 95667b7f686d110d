//! Reference-counted lifecycle for expensive shared resources.

use crate::error::{Result, ServientError};
use parking_lot::Mutex;

struct Slot<T> {
    count: usize,
    resource: Option<T>,
}

/// Create-once/destroy-on-zero wrapper for an expensive shared handle, such as
/// a transport connection or an in-process message system shared by several
/// binding instances.
///
/// All transitions are serialized under a single lock, so the supplier runs
/// exactly once per 0→1 transition and the cleanup exactly once per 1→0
/// transition, regardless of concurrent callers.
///
/// # Invariants
///
/// - `resource` is present exactly while `count > 0`
/// - supplier/cleanup failures surface as `ResourceLifecycle` errors and leave
///   the slot cleared, so a later retain starts from scratch
pub struct RefCountResource<T: Clone> {
    slot: Mutex<Slot<T>>,
    supplier: Box<dyn Fn() -> Result<T> + Send + Sync>,
    cleanup: Box<dyn Fn(T) -> Result<()> + Send + Sync>,
}

impl<T: Clone> RefCountResource<T> {
    /// Wrap a supplier/cleanup pair. Nothing is created until the first
    /// [`retain`](Self::retain).
    pub fn new(
        supplier: impl Fn() -> Result<T> + Send + Sync + 'static,
        cleanup: impl Fn(T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: Mutex::new(Slot {
                count: 0,
                resource: None,
            }),
            supplier: Box::new(supplier),
            cleanup: Box::new(cleanup),
        }
    }

    /// Increment the reference count and return the shared resource, creating
    /// it on the 0→1 transition.
    pub fn retain(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        if slot.count == 0 {
            let resource =
                (self.supplier)().map_err(|e| ServientError::ResourceLifecycle(e.to_string()))?;
            slot.resource = Some(resource);
        }
        match &slot.resource {
            Some(resource) => {
                let resource = resource.clone();
                slot.count += 1;
                Ok(resource)
            }
            None => Err(ServientError::ResourceLifecycle(
                "resource slot empty while count > 0".into(),
            )),
        }
    }

    /// Decrement the reference count (floored at zero) and destroy the
    /// resource on the 1→0 transition.
    ///
    /// The slot is cleared before the cleanup runs, so it stays consistent
    /// even when the cleanup fails.
    pub fn release(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        slot.count = slot.count.saturating_sub(1);
        if slot.count == 0 {
            if let Some(resource) = slot.resource.take() {
                (self.cleanup)(resource)
                    .map_err(|e| ServientError::ResourceLifecycle(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Current reference count.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slot.lock().count
    }

    /// Whether the resource currently exists.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.lock().resource.is_some()
    }
}
