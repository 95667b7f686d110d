//! Exposing side of the mesh binding: the registry root.

use crate::content::{CodecRegistry, Content, TD_MEDIA_TYPE};
use crate::error::{Result, ServientError};
use crate::mesh::client::ask;
use crate::mesh::factory::SharedSystemSlot;
use crate::mesh::messages::{AckReply, NodeMsg, NodeSender};
use crate::mesh::node::{spawn_thing_node, NodeCtx};
use crate::mesh::system::MeshSystem;
use crate::mesh::MeshConfig;
use crate::protocol::{ProtocolServer, RefCountResource};
use crate::thing::ExposedThing;
use crate::types::Thing;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// `ProtocolServer` hosting exposed Things on a shared [`MeshSystem`].
///
/// `expose` resolves once the Thing's whole subtree has registered (the
/// creation barrier), bounded by the configured ask timeout. Teardown sends
/// `Stop` down the subtree without any barrier.
pub struct MeshServer {
    config: MeshConfig,
    codecs: Arc<CodecRegistry>,
    slot: SharedSystemSlot,
    registry: Mutex<Option<NodeSender>>,
}

impl MeshServer {
    /// Wire a server to a shared system handle from
    /// [`shared_system`](crate::mesh::shared_system) and the servient's codec
    /// registry.
    pub fn new(
        config: MeshConfig,
        shared: Arc<RefCountResource<Arc<MeshSystem>>>,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            config,
            codecs,
            slot: SharedSystemSlot::new(shared),
            registry: Mutex::new(None),
        }
    }

    fn registry(&self) -> Result<NodeSender> {
        self.registry
            .lock()
            .clone()
            .ok_or_else(|| ServientError::Transport("mesh server not started".into()))
    }
}

#[async_trait]
impl ProtocolServer for MeshServer {
    async fn start(&self) -> Result<()> {
        let system = self.slot.acquire()?;
        let mut registry = self.registry.lock();
        if registry.is_none() {
            let ctx = Arc::new(NodeCtx {
                system,
                config: self.config.clone(),
                codecs: self.codecs.clone(),
            });
            *registry = Some(spawn_registry(ctx));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(registry) = self.registry.lock().take() {
            let _ = registry.send(NodeMsg::Stop);
        }
        self.slot.drop_handle()
    }

    async fn expose(&self, thing: Arc<ExposedThing>) -> Result<()> {
        let registry = self.registry()?;
        ask(
            &registry,
            |reply| NodeMsg::Expose { thing, reply },
            self.config.ask_timeout,
        )
        .await
    }

    async fn destroy(&self, thing_id: &str) -> Result<()> {
        let registry = self.registry()?;
        let thing_id = thing_id.to_string();
        ask(
            &registry,
            |reply| NodeMsg::Destroy { thing_id, reply },
            self.config.ask_timeout,
        )
        .await
    }
}

/// Spawn the registry root node at `/things`.
///
/// Keys Things by id, rejecting duplicates, and resolves each `Expose` when
/// the subtree's `Created` bubbles up.
fn spawn_registry(ctx: Arc<NodeCtx>) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let path = "/things".to_string();
    ctx.system.bind(path.clone(), tx.clone());

    tokio::spawn({
        let mailbox = tx.clone();
        let path = path.clone();
        async move {
            let mut things: HashMap<String, (NodeSender, Arc<ExposedThing>)> = HashMap::new();
            let mut registering: HashMap<String, AckReply> = HashMap::new();

            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Expose { thing, reply } => {
                        let id = thing.id().to_string();
                        if things.contains_key(&id) {
                            let _ = reply.send(Err(ServientError::AlreadyExposed(id)));
                            continue;
                        }
                        tracing::info!(thing = %id, "exposing thing");
                        let node = spawn_thing_node(ctx.clone(), thing.clone(), mailbox.clone());
                        registering.insert(format!("/things/{id}"), reply);
                        things.insert(id, (node, thing));
                    }
                    NodeMsg::Created { path: child } => {
                        if let Some(reply) = registering.remove(&child) {
                            let _ = reply.send(Ok(()));
                        }
                    }
                    NodeMsg::Destroy { thing_id, reply } => match things.remove(&thing_id) {
                        Some((node, _)) => {
                            tracing::info!(thing = %thing_id, "destroying thing");
                            let _ = node.send(NodeMsg::Stop);
                            let _ = reply.send(Ok(()));
                        }
                        None => {
                            let _ = reply.send(Err(ServientError::NotFound(thing_id)));
                        }
                    },
                    NodeMsg::List { reply } => {
                        let directory: HashMap<&str, Thing> = things
                            .iter()
                            .map(|(id, (_, thing))| (id.as_str(), thing.describe()))
                            .collect();
                        let result = serde_json::to_vec(&directory)
                            .map(|body| Content::new(TD_MEDIA_TYPE, body))
                            .map_err(Into::into);
                        let _ = reply.send(result);
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }

            for (node, _) in things.values() {
                let _ = node.send(NodeMsg::Stop);
            }
            ctx.system.unbind(&path);
        }
    });
    tx
}
