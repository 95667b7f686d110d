//! The shared mesh system: one authority and its routing table.

use crate::mesh::messages::{NodeMsg, NodeSender};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local message system shared by every mesh binding instance with
/// the same configuration.
///
/// Maps node paths (e.g. `/things/lamp/properties/on`) to mailboxes. Nodes
/// bind themselves while registering and unbind on stop; a completed unbind
/// is visible to subsequent lookups.
pub struct MeshSystem {
    authority: String,
    routes: Mutex<HashMap<String, NodeSender>>,
}

impl MeshSystem {
    pub(crate) fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            routes: Mutex::new(HashMap::new()),
        }
    }

    /// Authority component used in hrefs addressing this system.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub(crate) fn bind(&self, path: String, mailbox: NodeSender) {
        self.routes.lock().insert(path, mailbox);
    }

    pub(crate) fn unbind(&self, path: &str) {
        self.routes.lock().remove(path);
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<NodeSender> {
        self.routes.lock().get(path).cloned()
    }

    /// Number of currently bound node addresses.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.lock().len()
    }

    /// Whether a node is bound at this path.
    #[must_use]
    pub fn has_route(&self, path: &str) -> bool {
        self.routes.lock().contains_key(path)
    }

    /// Send `Stop` to every bound node and clear the table.
    pub(crate) fn stop_all(&self) {
        let mut routes = self.routes.lock();
        for mailbox in routes.values() {
            let _ = mailbox.send(NodeMsg::Stop);
        }
        routes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_bind_lookup_unbind() {
        let system = MeshSystem::new("servient");
        let (tx, _rx) = mpsc::unbounded_channel();

        system.bind("/things/x".to_string(), tx);
        assert!(system.has_route("/things/x"));
        assert!(system.lookup("/things/x").is_some());
        assert_eq!(system.route_count(), 1);

        system.unbind("/things/x");
        assert!(system.lookup("/things/x").is_none());
        assert_eq!(system.route_count(), 0);
    }
}
