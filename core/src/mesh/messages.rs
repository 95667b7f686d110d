//! Message vocabulary of the exposition protocol.
//!
//! The interaction name is not carried in request messages; it is encoded in
//! the target address, which resolves to the leaf owning that interaction.

use crate::content::Content;
use crate::error::{Result, ServientError};
use crate::thing::ExposedThing;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Reply channel for requests answered with a payload.
pub(crate) type ContentReply = oneshot::Sender<Result<Content>>;

/// Reply channel for requests answered with a bare acknowledgement.
pub(crate) type AckReply = oneshot::Sender<Result<()>>;

/// Mailbox handle of a node.
pub(crate) type NodeSender = mpsc::UnboundedSender<NodeMsg>;

/// Messages exchanged between nodes and with consumers.
pub(crate) enum NodeMsg {
    /// Registry: expose a Thing; answered once its subtree is fully registered.
    Expose {
        thing: Arc<ExposedThing>,
        reply: AckReply,
    },
    /// Registry: tear an exposed Thing down.
    Destroy { thing_id: String, reply: AckReply },
    /// Child→parent registration acknowledgement of the creation barrier.
    Created { path: String },
    /// Leaf: read the property value.
    Read { reply: ContentReply },
    /// Leaf: write the property value; acknowledged with an empty body.
    Write {
        content: Content,
        reply: ContentReply,
    },
    /// Leaf: invoke the action.
    Invoke {
        input: Option<Content>,
        reply: ContentReply,
    },
    /// Thing node: read all readable properties as one object.
    ReadAll { reply: ContentReply },
    /// Thing node: serialize the Thing Description.
    Describe { reply: ContentReply },
    /// Registry: list every exposed Thing's description.
    List { reply: ContentReply },
    /// Leaf: attach a subscriber; notifications flow through `sink` until
    /// either side drops out.
    Subscribe {
        sink: async_channel::Sender<SubscriptionMsg>,
    },
    /// Stop the node and its subtree.
    Stop,
}

impl NodeMsg {
    /// Answer a request that reached a node which cannot serve it.
    pub(crate) fn reject(self, path: &str) {
        let unsupported = || ServientError::NotFound(format!("no such operation at {path}"));
        match self {
            NodeMsg::Read { reply }
            | NodeMsg::Write { reply, .. }
            | NodeMsg::Invoke { reply, .. }
            | NodeMsg::ReadAll { reply }
            | NodeMsg::Describe { reply }
            | NodeMsg::List { reply } => {
                let _ = reply.send(Err(unsupported()));
            }
            NodeMsg::Expose { reply, .. } | NodeMsg::Destroy { reply, .. } => {
                let _ = reply.send(Err(unsupported()));
            }
            NodeMsg::Created { .. } | NodeMsg::Subscribe { .. } | NodeMsg::Stop => {
                tracing::debug!(path = %path, "dropping message this node does not handle");
            }
        }
    }
}

/// Notifications pushed from a leaf to one subscriber.
pub(crate) enum SubscriptionMsg {
    /// One notification; an empty body means "no payload".
    Next(Content),
    /// Terminal failure of the subscription.
    Error(String),
    /// Natural end of the subscription.
    Complete,
}
