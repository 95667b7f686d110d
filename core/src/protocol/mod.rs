//! The capability contract every transport binding implements.
//!
//! The servient core never depends on a binding's internals; it only speaks
//! this contract. Each capability is independently optional: the default
//! methods fail with `NotImplemented`, so a binding implements exactly what
//! its protocol can do and the failure semantics stay uniform.

mod refcount;

pub use refcount::RefCountResource;

use crate::content::Content;
use crate::error::{Result, ServientError};
use crate::types::{Form, SecurityScheme, Thing};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Push sequence of typed payloads produced by an observation.
///
/// Unbounded, cold and non-restartable; terminates naturally only on remote
/// completion or remote error. Dropping the stream cancels the observation
/// best-effort.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<Content>> + Send>>;

/// Push sequence of Thing Descriptions produced by discovery.
pub type ThingStream = Pin<Box<dyn Stream<Item = Result<Thing>> + Send>>;

/// Filter narrowing a discovery request.
#[derive(Clone, Debug, Default)]
pub struct ThingFilter {
    /// Free-form query understood by the binding, if any.
    pub query: Option<String>,
}

/// Client side of a transport binding.
///
/// Calls never fail synchronously from the call itself; errors are returned
/// through the future. The exceptions are `observe` and `discover`, whose
/// precondition failures (such as `NotImplemented`) surface immediately,
/// before any stream is produced.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Read the resource behind a Form.
    async fn read(&self, _form: &Form) -> Result<Content> {
        Err(ServientError::not_implemented("read"))
    }

    /// Write a payload to the resource behind a Form. Returns the
    /// acknowledgement payload, which may be empty.
    async fn write(&self, _form: &Form, _content: Content) -> Result<Content> {
        Err(ServientError::not_implemented("write"))
    }

    /// Invoke the operation behind a Form, with an optional input payload.
    async fn invoke(&self, _form: &Form, _content: Option<Content>) -> Result<Content> {
        Err(ServientError::not_implemented("invoke"))
    }

    /// Open a push stream for the resource behind a Form.
    fn observe(&self, _form: &Form) -> Result<ContentStream> {
        Err(ServientError::not_implemented("observe"))
    }

    /// Search for Things reachable through this binding.
    fn discover(&self, _filter: &ThingFilter) -> Result<ThingStream> {
        Err(ServientError::not_implemented("discover"))
    }

    /// Install credentials for the given security schemes. Returns whether the
    /// binding applied them; the default is an inert `false`.
    fn set_security(
        &self,
        _schemes: &[SecurityScheme],
        _credentials: Option<&serde_json::Value>,
    ) -> bool {
        false
    }
}

/// Factory producing clients for one URI scheme, with a start/stop lifecycle.
///
/// `init` and `destroy` are called once per servient start/stop. Factories
/// sharing an expensive resource (a connection, an in-process system) guard
/// it with a [`RefCountResource`], which also makes repeated calls after the
/// first successful init/destroy pair harmless.
#[async_trait]
pub trait ProtocolClientFactory: Send + Sync {
    /// URI scheme served by clients of this factory, e.g. `"coap"`.
    fn scheme(&self) -> &str;

    /// Produce a client. Cheap; clients share the factory's resources.
    fn client(&self) -> Arc<dyn ProtocolClient>;

    /// Acquire the factory's resources.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Release the factory's resources.
    async fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

/// Server side of a transport binding: hosts exposed Things.
#[async_trait]
pub trait ProtocolServer: Send + Sync {
    /// Start serving. Called once per servient start.
    async fn start(&self) -> Result<()>;

    /// Stop serving and tear down every exposed Thing.
    async fn stop(&self) -> Result<()>;

    /// Make a Thing reachable through this binding. Resolves once the Thing
    /// is fully registered.
    async fn expose(&self, thing: Arc<crate::thing::ExposedThing>) -> Result<()>;

    /// Withdraw a Thing from this binding.
    async fn destroy(&self, thing_id: &str) -> Result<()>;
}
