//! Per-subscription bridge and forwarder tasks.
//!
//! Each subscriber owns exactly one bridge on the consuming side and one
//! forwarder on the exposing side, joined by a subscription channel. Either
//! end dropping its half tears the pair down on the next scheduling point;
//! no teardown message crosses the mesh.

use crate::content::{CodecRegistry, Content};
use crate::error::{Result, ServientError};
use crate::mesh::messages::SubscriptionMsg;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Consumer-side bridge: the single writer into one subscriber's stream.
///
/// Relays `Next` items in arrival order, terminates on the first terminal
/// message, and exits as soon as the subscriber drops the output stream.
pub(crate) fn spawn_bridge(
    subscription: async_channel::Receiver<SubscriptionMsg>,
    out: async_channel::Sender<Result<Content>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(SubscriptionMsg::Next(content)) => {
                    if out.send(Ok(content)).await.is_err() {
                        // subscriber cancelled; dropping `subscription` lets
                        // the forwarder notice on its next push
                        break;
                    }
                }
                Ok(SubscriptionMsg::Error(message)) => {
                    let _ = out.send(Err(ServientError::Transport(message))).await;
                    break;
                }
                Ok(SubscriptionMsg::Complete) | Err(_) => break,
            }
        }
    })
}

/// Exposing-side forwarder: encodes notifications from one interaction's
/// subject and pushes them to one subscriber until either side is gone.
pub(crate) fn spawn_forwarder(
    observer: async_channel::Receiver<Option<Value>>,
    sink: async_channel::Sender<SubscriptionMsg>,
    codecs: Arc<CodecRegistry>,
    media_type: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match observer.recv().await {
                Ok(item) => {
                    let message = match item {
                        Some(value) => match codecs.value_to_content(&value, &media_type) {
                            Ok(content) => SubscriptionMsg::Next(content),
                            Err(e) => {
                                let _ = sink.send(SubscriptionMsg::Error(e.to_string())).await;
                                break;
                            }
                        },
                        // payload-less notification
                        None => SubscriptionMsg::Next(Content::empty(media_type.clone())),
                    };
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                Err(_) => {
                    // the interaction (and its subject) is gone
                    let _ = sink.send(SubscriptionMsg::Complete).await;
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_bridge_relays_in_order_then_completes() {
        let (sub_tx, sub_rx) = async_channel::unbounded();
        let (out_tx, out_rx) = async_channel::unbounded();
        let bridge = spawn_bridge(sub_rx, out_tx);

        for i in 0..3 {
            sub_tx
                .send(SubscriptionMsg::Next(Content::new(
                    "application/json",
                    format!("{i}").into_bytes(),
                )))
                .await
                .unwrap();
        }
        sub_tx.send(SubscriptionMsg::Complete).await.unwrap();

        for i in 0..3 {
            let content = out_rx.recv().await.unwrap().unwrap();
            assert_eq!(content.body, format!("{i}").as_bytes());
        }
        // completion closes the stream
        assert!(out_rx.recv().await.is_err());
        bridge.await.unwrap();
    }

    #[tokio::test]
    async fn test_bridge_terminates_on_error() {
        let (sub_tx, sub_rx) = async_channel::unbounded();
        let (out_tx, out_rx) = async_channel::unbounded();
        let bridge = spawn_bridge(sub_rx, out_tx);

        sub_tx
            .send(SubscriptionMsg::Error("remote gone".into()))
            .await
            .unwrap();

        let err = out_rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, ServientError::Transport(_)));
        assert!(out_rx.recv().await.is_err());
        bridge.await.unwrap();
    }

    #[tokio::test]
    async fn test_bridge_exits_when_subscriber_drops() {
        let (sub_tx, sub_rx) = async_channel::unbounded();
        let (out_tx, out_rx) = async_channel::unbounded();
        let bridge = spawn_bridge(sub_rx, out_tx);

        drop(out_rx);
        sub_tx
            .send(SubscriptionMsg::Next(Content::empty("application/json")))
            .await
            .unwrap();

        bridge.await.unwrap();
        assert!(sub_tx.is_closed());
    }

    #[tokio::test]
    async fn test_forwarder_encodes_and_completes() {
        let (value_tx, value_rx) = async_channel::unbounded();
        let (sink_tx, sink_rx) = async_channel::unbounded();
        let forwarder = spawn_forwarder(
            value_rx,
            sink_tx,
            Arc::new(CodecRegistry::default()),
            "application/json".to_string(),
        );

        value_tx.send(Some(json!(7))).await.unwrap();
        value_tx.send(None).await.unwrap();
        drop(value_tx);

        match sink_rx.recv().await.unwrap() {
            SubscriptionMsg::Next(content) => assert_eq!(&content.body[..], b"7"),
            _ => panic!("expected a notification"),
        }
        match sink_rx.recv().await.unwrap() {
            SubscriptionMsg::Next(content) => assert!(content.is_empty()),
            _ => panic!("expected a payload-less notification"),
        }
        assert!(matches!(
            sink_rx.recv().await.unwrap(),
            SubscriptionMsg::Complete
        ));
        forwarder.await.unwrap();
    }
}
