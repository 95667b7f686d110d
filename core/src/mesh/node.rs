//! Node tasks of the exposition tree.
//!
//! Every node is a tokio task draining an unbounded FIFO mailbox and walks
//! the same lifecycle: `Initializing → Registering → Ready → Stopped`.
//! Composites register by fanning out one child per member of their
//! collection and fan back in on `Created` acknowledgements; leaves register
//! by synthesizing their address, attaching the derived Form to the live
//! interaction and reporting `Created` upward.

use crate::content::{CodecRegistry, Content, TD_MEDIA_TYPE};
use crate::mesh::messages::{ContentReply, NodeMsg, NodeSender};
use crate::mesh::observer::spawn_forwarder;
use crate::mesh::system::MeshSystem;
use crate::mesh::{MeshConfig, SCHEME};
use crate::thing::{ExposedAction, ExposedEvent, ExposedProperty, ExposedThing, InvokeOptions};
use crate::types::{Form, Operation, ThingProperty};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Lifecycle of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeState {
    Registering,
    Ready,
    Stopped,
}

/// Everything a node needs from its binding instance.
pub(crate) struct NodeCtx {
    pub system: Arc<MeshSystem>,
    pub config: MeshConfig,
    pub codecs: Arc<CodecRegistry>,
}

/// Deferred leaf spawn, handed to a composite together with the leaf's path.
pub(crate) type LeafSpawner = Box<dyn FnOnce(NodeSender) -> NodeSender + Send>;

fn mesh_href(authority: &str, path: &str, fragment: &str) -> String {
    format!("{SCHEME}://{authority}{path}#{fragment}")
}

/// Operations a property Form advertises, derived from the access flags.
fn property_operations(property: &ThingProperty) -> Vec<Operation> {
    let mut ops = if property.read_only {
        vec![Operation::ReadProperty]
    } else if property.write_only {
        vec![Operation::WriteProperty]
    } else {
        vec![Operation::ReadProperty, Operation::WriteProperty]
    };
    if property.observable {
        ops.push(Operation::ObserveProperty);
    }
    ops
}

/// Reply to a request, or swallow the failure the way the protocol demands:
/// the error is logged locally and the reply sender is parked, so the remote
/// caller's ask runs into its timeout. `strict_errors` forwards the error
/// instead.
fn answer(
    ctx: &NodeCtx,
    path: &str,
    what: &str,
    result: crate::error::Result<Content>,
    reply: ContentReply,
    parked: &mut Vec<ContentReply>,
) {
    match result {
        Ok(content) => {
            let _ = reply.send(Ok(content));
        }
        Err(e) if ctx.config.strict_errors => {
            let _ = reply.send(Err(e));
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "{what} failed; caller will time out");
            parked.push(reply);
        }
    }
}

/// Spawn the node owning one property.
pub(crate) fn spawn_property_node(
    ctx: Arc<NodeCtx>,
    thing_path: String,
    property: Arc<ExposedProperty>,
    parent: NodeSender,
) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let path = format!("{}/properties/{}", thing_path, property.name());
    ctx.system.bind(path.clone(), tx.clone());

    tokio::spawn({
        let path = path.clone();
        async move {
            let media_type = ctx.config.content_type.clone();
            let form = Form::new(mesh_href(
                ctx.system.authority(),
                &thing_path,
                &format!("properties/{}", property.name()),
            ))
            .with_ops(property_operations(property.description()))
            .with_content_type(&media_type);
            property.add_form(form);
            let _ = parent.send(NodeMsg::Created { path: path.clone() });

            let mut parked: Vec<ContentReply> = Vec::new();
            let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Read { reply } => {
                        let result = match property.read().await {
                            Ok(value) => ctx.codecs.value_to_content(&value, &media_type),
                            Err(e) => Err(e),
                        };
                        answer(&ctx, &path, "property read", result, reply, &mut parked);
                    }
                    NodeMsg::Write { content, reply } => {
                        let schema = property.description().schema();
                        let result = match ctx.codecs.content_to_value(&content, &schema) {
                            Ok(value) => property
                                .write(value)
                                .await
                                .map(|_| Content::empty(media_type.clone())),
                            Err(e) => Err(e),
                        };
                        answer(&ctx, &path, "property write", result, reply, &mut parked);
                    }
                    NodeMsg::Subscribe { sink } => {
                        forwarders.push(spawn_forwarder(
                            property.observer(),
                            sink,
                            ctx.codecs.clone(),
                            media_type.clone(),
                        ));
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }

            ctx.system.unbind(&path);
            for forwarder in forwarders {
                forwarder.abort();
            }
        }
    });
    tx
}

/// Spawn the node owning one action.
pub(crate) fn spawn_action_node(
    ctx: Arc<NodeCtx>,
    thing_path: String,
    action: Arc<ExposedAction>,
    parent: NodeSender,
) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let path = format!("{}/actions/{}", thing_path, action.name());
    ctx.system.bind(path.clone(), tx.clone());

    tokio::spawn({
        let path = path.clone();
        async move {
            let media_type = ctx.config.content_type.clone();
            let form = Form::new(mesh_href(
                ctx.system.authority(),
                &thing_path,
                &format!("actions/{}", action.name()),
            ))
            .with_op(Operation::InvokeAction)
            .with_content_type(&media_type);
            action.add_form(form);
            let _ = parent.send(NodeMsg::Created { path: path.clone() });

            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Invoke { input, reply } => {
                        let result = invoke(&ctx, &action, input, &media_type).await;
                        let _ = reply.send(result);
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }
            ctx.system.unbind(&path);
        }
    });
    tx
}

async fn invoke(
    ctx: &NodeCtx,
    action: &ExposedAction,
    input: Option<Content>,
    media_type: &str,
) -> crate::error::Result<Content> {
    let input_value = match input {
        Some(content) if !content.is_empty() => {
            let schema = action.description().input.clone().unwrap_or_default();
            Some(ctx.codecs.content_to_value(&content, &schema)?)
        }
        _ => None,
    };
    let output = action.invoke(input_value, InvokeOptions::default()).await?;
    match output {
        Some(value) => ctx.codecs.value_to_content(&value, media_type),
        None => Ok(Content::empty(media_type)),
    }
}

/// Spawn the node owning one event.
pub(crate) fn spawn_event_node(
    ctx: Arc<NodeCtx>,
    thing_path: String,
    event: Arc<ExposedEvent>,
    parent: NodeSender,
) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let path = format!("{}/events/{}", thing_path, event.name());
    ctx.system.bind(path.clone(), tx.clone());

    tokio::spawn({
        let path = path.clone();
        async move {
            let media_type = ctx.config.content_type.clone();
            let form = Form::new(mesh_href(
                ctx.system.authority(),
                &thing_path,
                &format!("events/{}", event.name()),
            ))
            .with_op(Operation::SubscribeEvent)
            .with_content_type(&media_type);
            event.add_form(form);
            let _ = parent.send(NodeMsg::Created { path: path.clone() });

            let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Subscribe { sink } => {
                        forwarders.push(spawn_forwarder(
                            event.observer(),
                            sink,
                            ctx.codecs.clone(),
                            media_type.clone(),
                        ));
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }
            ctx.system.unbind(&path);
            for forwarder in forwarders {
                forwarder.abort();
            }
        }
    });
    tx
}

/// Spawn a composite node owning a collection of leaves.
///
/// `leaves` pairs each child's path with its deferred spawn. An empty
/// collection is immediately ready and reports `Created` without waiting.
pub(crate) fn spawn_composite_node(
    path: String,
    leaves: Vec<(String, LeafSpawner)>,
    parent: NodeSender,
) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn({
        let mailbox = tx.clone();
        async move {
            let mut state = NodeState::Registering;
            let mut pending: HashSet<String> = HashSet::new();
            let mut children: Vec<NodeSender> = Vec::new();
            for (leaf_path, spawner) in leaves {
                pending.insert(leaf_path);
                children.push(spawner(mailbox.clone()));
            }
            if pending.is_empty() {
                state = NodeState::Ready;
                let _ = parent.send(NodeMsg::Created { path: path.clone() });
            }

            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Created { path: child } => {
                        pending.remove(&child);
                        if state == NodeState::Registering && pending.is_empty() {
                            state = NodeState::Ready;
                            let _ = parent.send(NodeMsg::Created { path: path.clone() });
                        }
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }
            for child in &children {
                let _ = child.send(NodeMsg::Stop);
            }
        }
    });
    tx
}

/// Spawn the node mirroring one exposed Thing.
///
/// Registers thing-level Forms, fans out the three interaction composites and
/// reports `Created` to the registry once all of them have fanned back in.
pub(crate) fn spawn_thing_node(
    ctx: Arc<NodeCtx>,
    thing: Arc<ExposedThing>,
    parent: NodeSender,
) -> NodeSender {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let path = format!("/things/{}", thing.id());
    ctx.system.bind(path.clone(), tx.clone());

    tokio::spawn({
        let path = path.clone();
        let mailbox = tx.clone();
        async move {
            let authority = ctx.system.authority().to_string();
            thing.add_form(
                Form::new(mesh_href(&authority, &path, "thing")).with_content_type(TD_MEDIA_TYPE),
            );
            thing.add_form(
                Form::new(mesh_href(&authority, &path, "all/properties"))
                    .with_op(Operation::ReadAllProperties)
                    .with_content_type(&ctx.config.content_type),
            );

            let property_leaves: Vec<(String, LeafSpawner)> = thing
                .properties()
                .map(|(name, property)| {
                    let leaf_path = format!("{path}/properties/{name}");
                    let ctx = ctx.clone();
                    let thing_path = path.clone();
                    let property = property.clone();
                    let spawner: LeafSpawner = Box::new(move |parent| {
                        spawn_property_node(ctx, thing_path, property, parent)
                    });
                    (leaf_path, spawner)
                })
                .collect();
            let action_leaves: Vec<(String, LeafSpawner)> = thing
                .actions()
                .map(|(name, action)| {
                    let leaf_path = format!("{path}/actions/{name}");
                    let ctx = ctx.clone();
                    let thing_path = path.clone();
                    let action = action.clone();
                    let spawner: LeafSpawner =
                        Box::new(move |parent| spawn_action_node(ctx, thing_path, action, parent));
                    (leaf_path, spawner)
                })
                .collect();
            let event_leaves: Vec<(String, LeafSpawner)> = thing
                .events()
                .map(|(name, event)| {
                    let leaf_path = format!("{path}/events/{name}");
                    let ctx = ctx.clone();
                    let thing_path = path.clone();
                    let event = event.clone();
                    let spawner: LeafSpawner =
                        Box::new(move |parent| spawn_event_node(ctx, thing_path, event, parent));
                    (leaf_path, spawner)
                })
                .collect();

            let mut state = NodeState::Registering;
            let mut pending: HashSet<String> = HashSet::new();
            let mut children: Vec<NodeSender> = Vec::new();
            for (collection, leaves) in [
                ("properties", property_leaves),
                ("actions", action_leaves),
                ("events", event_leaves),
            ] {
                let composite_path = format!("{path}/{collection}");
                pending.insert(composite_path.clone());
                children.push(spawn_composite_node(
                    composite_path,
                    leaves,
                    mailbox.clone(),
                ));
            }

            let mut parked: Vec<ContentReply> = Vec::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    NodeMsg::Created { path: child } => {
                        pending.remove(&child);
                        if state == NodeState::Registering && pending.is_empty() {
                            state = NodeState::Ready;
                            tracing::debug!(path = %path, "thing fully registered");
                            let _ = parent.send(NodeMsg::Created { path: path.clone() });
                        }
                    }
                    NodeMsg::Describe { reply } => {
                        let result = serde_json::to_vec(&thing.describe())
                            .map(|body| Content::new(TD_MEDIA_TYPE, body))
                            .map_err(Into::into);
                        let _ = reply.send(result);
                    }
                    NodeMsg::ReadAll { reply } => {
                        let result = match thing.read_all_properties().await {
                            Ok(values) => ctx.codecs.value_to_content(
                                &serde_json::Value::Object(values),
                                &ctx.config.content_type,
                            ),
                            Err(e) => Err(e),
                        };
                        answer(&ctx, &path, "read all properties", result, reply, &mut parked);
                    }
                    NodeMsg::Stop => break,
                    other => other.reject(&path),
                }
            }
            ctx.system.unbind(&path);
            for child in &children {
                let _ = child.send(NodeMsg::Stop);
            }
            drop(parked);
        }
    });
    tx
}
