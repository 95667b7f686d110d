//! The servient runtime: hosts exposed Things and consumes remote ones.

use crate::content::{CodecRegistry, ContentCodec};
use crate::error::{Result, ServientError};
use crate::mesh::{shared_system, MeshClientFactory, MeshConfig, MeshServer};
use crate::protocol::{ProtocolClient, ProtocolClientFactory, ProtocolServer};
use crate::thing::{ConsumedThing, ExposedThing};
use crate::types::Thing;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Runtime hosting one or more exposed/consumed Things and their bindings.
///
/// The servient owns the codec registry, the client factories keyed by URI
/// scheme, and the protocol servers. `start` initializes every factory and
/// server once; `shutdown` destroys them in reverse, attempting every
/// teardown even when one fails.
pub struct Servient {
    codecs: Arc<CodecRegistry>,
    client_factories: HashMap<String, Arc<dyn ProtocolClientFactory>>,
    servers: Vec<Arc<dyn ProtocolServer>>,
    things: Mutex<HashMap<String, Arc<ExposedThing>>>,
}

impl Servient {
    pub fn builder() -> ServientBuilder {
        ServientBuilder::new()
    }

    /// The servient's codec registry.
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// Initialize every client factory and start every server.
    pub async fn start(&self) -> Result<()> {
        for factory in self.client_factories.values() {
            factory.init().await?;
        }
        for server in &self.servers {
            server.start().await?;
        }
        tracing::info!(
            factories = self.client_factories.len(),
            servers = self.servers.len(),
            "servient started"
        );
        Ok(())
    }

    /// Stop every server and destroy every factory.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_error = None;
        for server in &self.servers {
            if let Err(e) = server.stop().await {
                tracing::warn!(error = %e, "server stop failed");
                first_error.get_or_insert(e);
            }
        }
        for factory in self.client_factories.values() {
            if let Err(e) = factory.destroy().await {
                tracing::warn!(error = %e, "factory destroy failed");
                first_error.get_or_insert(e);
            }
        }
        self.things.lock().clear();
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Expose a Thing through every configured server, resolving once each
    /// binding has fully registered it.
    pub async fn expose(&self, thing: Arc<ExposedThing>) -> Result<()> {
        let id = thing.id().to_string();
        {
            let mut things = self.things.lock();
            if things.contains_key(&id) {
                return Err(ServientError::AlreadyExposed(id));
            }
            things.insert(id.clone(), thing.clone());
        }
        for server in &self.servers {
            if let Err(e) = server.expose(thing.clone()).await {
                self.things.lock().remove(&id);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Tear an exposed Thing down on every server.
    pub async fn destroy(&self, thing_id: &str) -> Result<()> {
        if self.things.lock().remove(thing_id).is_none() {
            return Err(ServientError::NotFound(thing_id.to_string()));
        }
        for server in &self.servers {
            server.destroy(thing_id).await?;
        }
        Ok(())
    }

    /// An exposed Thing by id.
    pub fn thing(&self, thing_id: &str) -> Option<Arc<ExposedThing>> {
        self.things.lock().get(thing_id).cloned()
    }

    /// Build a client-side proxy for a Thing Description, wired to this
    /// servient's clients and codecs.
    pub fn consume(&self, thing: Thing) -> ConsumedThing {
        let clients: HashMap<String, Arc<dyn ProtocolClient>> = self
            .client_factories
            .iter()
            .map(|(scheme, factory)| (scheme.clone(), factory.client()))
            .collect();
        ConsumedThing::new(thing, clients, self.codecs.clone())
    }
}

/// Builder assembling a [`Servient`] from bindings and codecs.
pub struct ServientBuilder {
    codecs: Arc<CodecRegistry>,
    client_factories: HashMap<String, Arc<dyn ProtocolClientFactory>>,
    servers: Vec<Arc<dyn ProtocolServer>>,
}

impl ServientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: Arc::new(CodecRegistry::default()),
            client_factories: HashMap::new(),
            servers: Vec::new(),
        }
    }

    /// Register an additional content codec.
    #[must_use]
    pub fn with_codec(self, codec: Arc<dyn ContentCodec>) -> Self {
        self.codecs.register(codec);
        self
    }

    /// Add a client factory; its scheme keys the binding.
    #[must_use]
    pub fn with_client_factory(mut self, factory: Arc<dyn ProtocolClientFactory>) -> Self {
        self.client_factories
            .insert(factory.scheme().to_string(), factory);
        self
    }

    /// Add a protocol server.
    #[must_use]
    pub fn with_server(mut self, server: Arc<dyn ProtocolServer>) -> Self {
        self.servers.push(server);
        self
    }

    /// Add the mesh binding in one step: a server and a client factory
    /// sharing one refcounted system.
    #[must_use]
    pub fn with_mesh(self, config: MeshConfig) -> Self {
        let shared = shared_system(&config);
        let server = Arc::new(MeshServer::new(
            config.clone(),
            shared.clone(),
            self.codecs.clone(),
        ));
        let factory = Arc::new(MeshClientFactory::new(config, shared));
        self.with_server(server).with_client_factory(factory)
    }

    #[must_use]
    pub fn build(self) -> Servient {
        Servient {
            codecs: self.codecs,
            client_factories: self.client_factories,
            servers: self.servers,
            things: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ServientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
