//! In-process message-mesh binding: the distributed exposition protocol.
//!
//! Exposing a Thing through this binding builds a tree of mailbox-driven
//! tasks mirroring the Thing's structure:
//!
//! ```text
//!     registry (/things)
//!      │
//!     thing node (/things/<id>)
//!    / │ \
//!   properties  actions  events        (composite nodes)
//!   /    |         |        \
//!  leaf nodes, one per interaction
//! ```
//!
//! Each node owns an unbounded FIFO mailbox and processes it strictly in
//! order; there is no ordering guarantee across nodes. Registration uses a
//! fan-out/fan-in creation barrier: a composite is ready only once every
//! spawned child has reported `Created`, and the root `expose` call resolves
//! only when the whole subtree has registered its Forms.
//!
//! Consumers reach nodes through `mesh://` hrefs whose fragment selects the
//! request (`#properties/<name>`, `#actions/<name>`, `#events/<name>`,
//! `#all/properties`, `#thing`, `#thing-directory`); every request is an ask
//! bounded by [`MeshConfig::ask_timeout`]. Observation runs one bridge task
//! per subscriber, cancelled by dropping the stream.

mod client;
mod factory;
mod messages;
mod node;
mod observer;
mod server;
mod system;

pub use client::MeshClient;
pub use factory::{shared_system, MeshClientFactory};
pub use server::MeshServer;
pub use system::MeshSystem;

use std::time::Duration;

/// URI scheme of this binding.
pub const SCHEME: &str = "mesh";

/// Configuration shared by the mesh server and client factories.
#[derive(Clone, Debug)]
pub struct MeshConfig {
    /// Authority component of synthesized hrefs, naming the mesh system.
    pub authority: String,

    /// Bound applied to every ask-pattern request, including the creation
    /// barrier wait on expose.
    pub ask_timeout: Duration,

    /// Forward leaf handler failures to the remote caller instead of logging
    /// them and letting the caller time out.
    pub strict_errors: bool,

    /// Media type of synthesized Forms and encoded payloads.
    pub content_type: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            authority: "servient".to_string(),
            ask_timeout: Duration::from_secs(10),
            strict_errors: false,
            content_type: crate::content::DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

impl MeshConfig {
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    #[must_use]
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_strict_errors(mut self, strict: bool) -> Self {
        self.strict_errors = strict;
        self
    }
}
