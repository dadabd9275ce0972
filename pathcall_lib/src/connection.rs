use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::channel::{CallChannel, PendingMap};
use crate::dispatch::Dispatcher;
use crate::error::CallError;
use crate::messages::Frame;

/// Takes over a framed connection whose handshake already completed and
/// returns the call channel for it.
///
/// One task per connection: inbound requests are dispatched through
/// `dispatcher` (each in its own task, so slow bindings do not stall the
/// connection), inbound responses resolve pending calls, and outbound frames
/// drain the channel's queue. When the task ends, every pending call fails
/// with [`CallError::ConnectionClosed`].
pub(crate) fn spawn_connection<RW>(
    framed: Framed<RW, LengthDelimitedCodec>,
    dispatcher: Dispatcher,
) -> CallChannel
where
    RW: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let channel = CallChannel::new(outbound_tx.clone(), Arc::clone(&pending));

    tokio::spawn(drive(framed, dispatcher, outbound_tx, outbound_rx, pending));

    channel
}

async fn drive<RW>(
    mut framed: Framed<RW, LengthDelimitedCodec>,
    dispatcher: Dispatcher,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
    pending: PendingMap,
) where
    RW: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        tokio::select! {
            inbound = framed.next() => {
                let bytes = match inbound {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(err)) => {
                        warn!(error = %err, "connection read failed");
                        break;
                    }
                    None => break,
                };
                let frame = match Frame::try_from(bytes.freeze()) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "could not decode inbound frame");
                        break;
                    }
                };
                match frame {
                    Frame::Request { id, path, params } => {
                        let dispatcher = dispatcher.clone();
                        let outbound_tx = outbound_tx.clone();
                        tokio::spawn(async move {
                            let result = dispatcher.dispatch(&path, params).await;
                            // A send failure means the connection is already
                            // gone; there is nobody left to answer.
                            let _ = outbound_tx.send(Frame::Response { id, result });
                        });
                    }
                    Frame::Response { id, result } => {
                        let reply_tx = pending
                            .lock()
                            .expect("pending call map lock poisoned")
                            .remove(&id);
                        match reply_tx {
                            Some(reply_tx) => {
                                let _ = reply_tx.send(result.map_err(CallError::from));
                            }
                            None => debug!(id = id.0, "reply for unknown request id"),
                        }
                    }
                    Frame::Hello { role } => {
                        warn!(role, "unexpected hello after handshake, ignoring");
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                let frame = match outbound {
                    Some(frame) => frame,
                    None => break,
                };
                if let Err(err) = framed.send(Bytes::from(frame)).await {
                    warn!(error = %err, "connection write failed");
                    break;
                }
            }
        }
    }

    // Dropping the parked senders resolves every in-flight call with
    // ConnectionClosed on the caller side.
    pending
        .lock()
        .expect("pending call map lock poisoned")
        .clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::BindingMode;
    use crate::handler::raw_handler;
    use serde_json::json;
    use std::time::Duration;

    fn framed_pair() -> (
        Framed<tokio::io::DuplexStream, LengthDelimitedCodec>,
        Framed<tokio::io::DuplexStream, LengthDelimitedCodec>,
    ) {
        let (left, right) = tokio::io::duplex(64 * 1024);
        (
            Framed::new(left, LengthDelimitedCodec::new()),
            Framed::new(right, LengthDelimitedCodec::new()),
        )
    }

    #[tokio::test]
    async fn call_reaches_remote_binding_and_returns_its_value() {
        let (server_io, client_io) = framed_pair();
        let server_dispatcher = Dispatcher::new();
        server_dispatcher.register(
            BindingMode::Handler,
            "api/ping",
            raw_handler(|msg: String| async move {
                assert_eq!(msg, "PING");
                "PONG".to_string()
            }),
        );
        let _server_channel = spawn_connection(server_io, server_dispatcher);
        let client_channel = spawn_connection(client_io, Dispatcher::new());

        let result = client_channel
            .call("api/ping", vec![json!("PING")])
            .await
            .unwrap();
        assert_eq!(result, json!("PONG"));
    }

    #[tokio::test]
    async fn unregistered_path_resolves_to_failure() {
        let (server_io, client_io) = framed_pair();
        let _server_channel = spawn_connection(server_io, Dispatcher::new());
        let client_channel = spawn_connection(client_io, Dispatcher::new());

        let err = client_channel
            .call("api/nothing", vec![])
            .await
            .unwrap_err();
        match err {
            CallError::UnregisteredPath(path) => assert_eq!(path, "api/nothing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_calls_are_correlated_not_ordered() {
        let (server_io, client_io) = framed_pair();
        let dispatcher = Dispatcher::new();
        dispatcher.register(
            BindingMode::Handler,
            "slow",
            raw_handler(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                "slow".to_string()
            }),
        );
        dispatcher.register(
            BindingMode::Handler,
            "fast",
            raw_handler(|| async { "fast".to_string() }),
        );
        let _server_channel = spawn_connection(server_io, dispatcher);
        let client_channel = spawn_connection(client_io, Dispatcher::new());

        let slow = client_channel.call("slow", vec![]);
        let fast = client_channel.call("fast", vec![]);
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), json!("slow"));
        assert_eq!(fast.unwrap(), json!("fast"));
    }

    #[tokio::test]
    async fn peer_disconnect_fails_calls_instead_of_hanging() {
        let (server_io, client_io) = framed_pair();
        let client_channel = spawn_connection(client_io, Dispatcher::new());
        drop(server_io);

        // Depending on whether the drive task noticed the close yet, the
        // call fails on send or on the dropped reply sender.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = client_channel.call("api/ping", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            CallError::TransportUnavailable | CallError::ConnectionClosed
        ));
    }
}
