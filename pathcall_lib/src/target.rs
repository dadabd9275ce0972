use std::io;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::info;

use crate::channel::CallChannel;
use crate::connection::spawn_connection;
use crate::dispatch::Dispatcher;
use crate::messages::Frame;

/// Connection-target configuration for a calling endpoint.
#[derive(Debug, Clone)]
pub struct TargetOptions {
    pub address: String,
    pub port: u16,
}

/// The transport root of a calling endpoint: one outbound connection to a
/// hosting peer, established eagerly.
///
/// The target carries its own [`Dispatcher`] so the host can invoke bindings
/// registered on this side over the same connection.
pub struct Target {
    dispatcher: Dispatcher,
    channel: CallChannel,
}

impl Target {
    /// Connects and announces `role` as this endpoint's identity before any
    /// call is routed.
    pub async fn connect(options: TargetOptions, role: &str) -> io::Result<Target> {
        let mut address = options.address;
        if address.ends_with('/') {
            address.pop();
        }

        let socket = TcpStream::connect((address.as_str(), options.port)).await?;
        let mut framed = Framed::new(socket, LengthDelimitedCodec::new());
        framed
            .send(Bytes::from(Frame::Hello {
                role: role.to_string(),
            }))
            .await?;

        let dispatcher = Dispatcher::new();
        let channel = spawn_connection(framed, dispatcher.clone());
        info!(address, port = options.port, role, "connected");

        Ok(Target {
            dispatcher,
            channel,
        })
    }

    /// The shared call channel every Proxy construct of this target uses.
    pub fn channel(&self) -> CallChannel {
        self.channel.clone()
    }

    /// Attach point for this endpoint's own Registrar tree.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
