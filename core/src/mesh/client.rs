//! Consumer side of the mesh binding.
//!
//! A [`MeshClient`] turns a Form href into an ask against the node tree. The
//! href's path locates the Thing (or the registry), and the fragment selects
//! the request: `thing`, `thing-directory`, `all/properties`,
//! `properties/<name>`, `actions/<name>` or `events/<name>`.

use crate::content::Content;
use crate::error::{Result, ServientError};
use crate::mesh::factory::SharedSystemSlot;
use crate::mesh::messages::{NodeMsg, NodeSender, SubscriptionMsg};
use crate::mesh::observer::spawn_bridge;
use crate::mesh::{MeshConfig, SCHEME};
use crate::protocol::{ContentStream, ProtocolClient, ThingFilter, ThingStream};
use crate::types::{Form, Thing};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

/// Request selected by an href fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Thing,
    Directory,
    AllProperties,
    Property(String),
    Action(String),
    Event(String),
}

/// A parsed mesh href: authority, Thing (or registry) path and dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MeshAddress {
    pub authority: String,
    pub path: String,
    pub dispatch: Dispatch,
}

impl MeshAddress {
    /// The node address the request is sent to. Interaction requests resolve
    /// past the Thing path to the owning leaf.
    pub(crate) fn target_path(&self) -> String {
        match &self.dispatch {
            Dispatch::Thing | Dispatch::Directory | Dispatch::AllProperties => self.path.clone(),
            Dispatch::Property(name) => format!("{}/properties/{}", self.path, name),
            Dispatch::Action(name) => format!("{}/actions/{}", self.path, name),
            Dispatch::Event(name) => format!("{}/events/{}", self.path, name),
        }
    }
}

pub(crate) fn parse_href(href: &str) -> Result<MeshAddress> {
    let url = Url::parse(href)?;
    if url.scheme() != SCHEME {
        return Err(ServientError::InvalidHref(format!(
            "{href} is not a {SCHEME} href"
        )));
    }
    let authority = url
        .host_str()
        .ok_or_else(|| ServientError::InvalidHref(format!("{href} has no authority")))?
        .to_string();
    let fragment = url
        .fragment()
        .ok_or_else(|| ServientError::InvalidHref(format!("{href} has no fragment")))?;

    let dispatch = match fragment {
        "thing" => Dispatch::Thing,
        "thing-directory" => Dispatch::Directory,
        "all/properties" => Dispatch::AllProperties,
        _ => {
            let (kind, name) = fragment.split_once('/').ok_or_else(|| {
                ServientError::InvalidHref(format!("unknown fragment {fragment}"))
            })?;
            if name.is_empty() {
                return Err(ServientError::InvalidHref(format!(
                    "unknown fragment {fragment}"
                )));
            }
            match kind {
                "properties" => Dispatch::Property(name.to_string()),
                "actions" => Dispatch::Action(name.to_string()),
                "events" => Dispatch::Event(name.to_string()),
                _ => {
                    return Err(ServientError::InvalidHref(format!(
                        "unknown fragment {fragment}"
                    )))
                }
            }
        }
    };

    Ok(MeshAddress {
        authority,
        path: url.path().trim_end_matches('/').to_string(),
        dispatch,
    })
}

/// Send a request to a node and await its reply within the ask bound.
pub(crate) async fn ask<R>(
    target: &NodeSender,
    make: impl FnOnce(oneshot::Sender<Result<R>>) -> NodeMsg,
    timeout: Duration,
) -> Result<R> {
    let (reply_tx, reply_rx) = oneshot::channel();
    target
        .send(make(reply_tx))
        .map_err(|_| ServientError::Transport("mesh node unavailable".into()))?;
    match tokio::time::timeout(timeout, reply_rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ServientError::Transport(
            "mesh node stopped before replying".into(),
        )),
        Err(_) => Err(ServientError::Timeout),
    }
}

/// `ProtocolClient` for `mesh://` hrefs.
pub struct MeshClient {
    config: MeshConfig,
    slot: Arc<SharedSystemSlot>,
}

impl MeshClient {
    pub(crate) fn new(config: MeshConfig, slot: Arc<SharedSystemSlot>) -> Self {
        Self { config, slot }
    }

    /// Resolve an href to the mailbox of its target node.
    fn resolve(&self, href: &str) -> Result<(MeshAddress, NodeSender)> {
        let address = parse_href(href)?;
        let system = self.slot.system()?;
        if address.authority != system.authority() {
            return Err(ServientError::NotFound(format!(
                "unknown authority {}",
                address.authority
            )));
        }
        let target = address.target_path();
        let mailbox = system
            .lookup(&target)
            .ok_or_else(|| ServientError::NotFound(target.clone()))?;
        Ok((address, mailbox))
    }
}

#[async_trait]
impl ProtocolClient for MeshClient {
    async fn read(&self, form: &Form) -> Result<Content> {
        let (address, mailbox) = self.resolve(&form.href)?;
        let timeout = self.config.ask_timeout;
        match address.dispatch {
            Dispatch::Property(_) => ask(&mailbox, |reply| NodeMsg::Read { reply }, timeout).await,
            Dispatch::AllProperties => {
                ask(&mailbox, |reply| NodeMsg::ReadAll { reply }, timeout).await
            }
            Dispatch::Thing => ask(&mailbox, |reply| NodeMsg::Describe { reply }, timeout).await,
            Dispatch::Directory => ask(&mailbox, |reply| NodeMsg::List { reply }, timeout).await,
            _ => Err(ServientError::InvalidHref(format!(
                "cannot read {}",
                form.href
            ))),
        }
    }

    async fn write(&self, form: &Form, content: Content) -> Result<Content> {
        let (address, mailbox) = self.resolve(&form.href)?;
        match address.dispatch {
            Dispatch::Property(_) => {
                ask(
                    &mailbox,
                    |reply| NodeMsg::Write { content, reply },
                    self.config.ask_timeout,
                )
                .await
            }
            _ => Err(ServientError::InvalidHref(format!(
                "cannot write {}",
                form.href
            ))),
        }
    }

    async fn invoke(&self, form: &Form, content: Option<Content>) -> Result<Content> {
        let (address, mailbox) = self.resolve(&form.href)?;
        match address.dispatch {
            Dispatch::Action(_) => {
                ask(
                    &mailbox,
                    |reply| NodeMsg::Invoke {
                        input: content,
                        reply,
                    },
                    self.config.ask_timeout,
                )
                .await
            }
            _ => Err(ServientError::InvalidHref(format!(
                "cannot invoke {}",
                form.href
            ))),
        }
    }

    fn observe(&self, form: &Form) -> Result<ContentStream> {
        let (address, mailbox) = self.resolve(&form.href)?;
        match address.dispatch {
            Dispatch::Property(_) | Dispatch::Event(_) => {}
            _ => {
                return Err(ServientError::InvalidHref(format!(
                    "cannot observe {}",
                    form.href
                )))
            }
        }

        let (sink_tx, sink_rx) = async_channel::unbounded::<SubscriptionMsg>();
        mailbox
            .send(NodeMsg::Subscribe { sink: sink_tx })
            .map_err(|_| ServientError::Transport("mesh node unavailable".into()))?;

        let (out_tx, out_rx) = async_channel::unbounded();
        spawn_bridge(sink_rx, out_tx);
        Ok(Box::pin(out_rx))
    }

    fn discover(&self, _filter: &ThingFilter) -> Result<ThingStream> {
        let system = self.slot.system()?;
        let registry = system
            .lookup("/things")
            .ok_or_else(|| ServientError::NotFound("/things".into()))?;
        let timeout = self.config.ask_timeout;

        let (tx, rx) = async_channel::unbounded();
        tokio::spawn(async move {
            match ask(&registry, |reply| NodeMsg::List { reply }, timeout).await {
                Ok(content) => match serde_json::from_slice::<HashMap<String, Thing>>(&content.body)
                {
                    Ok(things) => {
                        for thing in things.into_values() {
                            if tx.send(Ok(thing)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                    }
                },
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });
        Ok(Box::pin(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_selects_property_read() {
        let address = parse_href("mesh://servient/things/bar#properties/count").unwrap();
        assert_eq!(address.dispatch, Dispatch::Property("count".into()));
        assert_eq!(address.path, "/things/bar");
        assert_eq!(address.target_path(), "/things/bar/properties/count");
    }

    #[test]
    fn test_fragment_selects_all_properties() {
        let address = parse_href("mesh://servient/things/bar#all/properties").unwrap();
        assert_eq!(address.dispatch, Dispatch::AllProperties);
        assert_eq!(address.target_path(), "/things/bar");
    }

    #[test]
    fn test_fragment_selects_describe() {
        let address = parse_href("mesh://servient/things/bar#thing").unwrap();
        assert_eq!(address.dispatch, Dispatch::Thing);
        assert_eq!(address.target_path(), "/things/bar");
    }

    #[test]
    fn test_fragment_selects_directory() {
        let address = parse_href("mesh://servient/things#thing-directory").unwrap();
        assert_eq!(address.dispatch, Dispatch::Directory);
        assert_eq!(address.target_path(), "/things");
    }

    #[test]
    fn test_fragment_selects_action_invoke() {
        let address = parse_href("mesh://servient/things/bar#actions/reset").unwrap();
        assert_eq!(address.dispatch, Dispatch::Action("reset".into()));
        assert_eq!(address.target_path(), "/things/bar/actions/reset");
    }

    #[test]
    fn test_fragment_selects_event_subscribe() {
        let address = parse_href("mesh://servient/things/bar#events/change").unwrap();
        assert_eq!(address.dispatch, Dispatch::Event("change".into()));
        assert_eq!(address.target_path(), "/things/bar/events/change");
    }

    #[test]
    fn test_missing_fragment_rejected() {
        let err = parse_href("mesh://servient/things/bar").unwrap_err();
        assert!(matches!(err, ServientError::InvalidHref(_)));
    }

    #[test]
    fn test_unknown_fragment_rejected() {
        for href in [
            "mesh://servient/things/bar#nope",
            "mesh://servient/things/bar#properties/",
            "mesh://servient/things/bar#gadgets/x",
        ] {
            assert!(parse_href(href).is_err(), "{href} should be rejected");
        }
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        let err = parse_href("http://servient/things/bar#thing").unwrap_err();
        assert!(matches!(err, ServientError::InvalidHref(_)));
    }
}
