use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use crate::channel::CallChannel;
use crate::connection::spawn_connection;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::messages::Frame;

/// Connection-acceptance configuration for a hosting endpoint.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Listening port. Port 0 picks an ephemeral port; see
    /// [`Server::local_addr`].
    pub port: u16,
    /// Recognized configuration for browser-facing transports. The raw
    /// socket transport has no origin concept and only logs the list.
    pub allowed_cors_origins: Vec<String>,
}

/// An accepted connection whose peer announced `role` during the handshake.
pub struct Accepted {
    role: String,
    channel: CallChannel,
}

impl Accepted {
    /// The role identity the peer announced.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The call channel for issuing requests back to this peer.
    pub fn channel(&self) -> CallChannel {
        self.channel.clone()
    }
}

type ConnectionCallbacks = Arc<Mutex<Vec<Box<dyn Fn(&Accepted) + Send + Sync>>>>;

/// The transport root of a hosting endpoint.
///
/// Owns the dispatcher that all registered bindings target. Bindings may be
/// registered at any time, before or after [`Server::run`].
pub struct Server {
    options: ServerOptions,
    enable_sockets: bool,
    role: String,
    dispatcher: Dispatcher,
    shutdown_signal: Mutex<Option<oneshot::Sender<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    connection_callbacks: ConnectionCallbacks,
}

impl Server {
    /// `role` is this endpoint's own role identity. `enable_sockets` gates
    /// the connection broadcast: when false, accepted connections still
    /// serve requests but [`Server::on_connection`] callbacks never fire.
    pub fn new(options: ServerOptions, enable_sockets: bool, role: impl Into<String>) -> Self {
        Server {
            options,
            enable_sockets,
            role: role.into(),
            dispatcher: Dispatcher::new(),
            shutdown_signal: Mutex::new(None),
            local_addr: Mutex::new(None),
            connection_callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The bound address, available once [`Server::run`] has returned.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .expect("local addr lock poisoned")
    }

    /// Registers a callback invoked once per accepted connection, after the
    /// peer's role handshake completed.
    pub fn on_connection(&self, callback: impl Fn(&Accepted) + Send + Sync + 'static) {
        self.connection_callbacks
            .lock()
            .expect("connection callback lock poisoned")
            .push(Box::new(callback));
    }

    /// Binds the listener and returns the accept-loop future. The future
    /// completes when [`Server::stop`] is called. Running twice without an
    /// intervening stop is an error; the first accept loop would otherwise
    /// lose its shutdown handle.
    pub async fn run(&self) -> Result<impl Future<Output = ()> + Send + 'static, ServerError> {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        {
            let mut shutdown_signal = self
                .shutdown_signal
                .lock()
                .expect("shutdown signal lock poisoned");
            if shutdown_signal.is_some() {
                return Err(ServerError::AlreadyRunning);
            }
            shutdown_signal.replace(shutdown_tx);
        }

        let listener = TcpListener::bind(("0.0.0.0", self.options.port)).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr
            .lock()
            .expect("local addr lock poisoned")
            .replace(local_addr);

        info!(role = self.role, %local_addr, "listening");
        debug!(origins = ?self.options.allowed_cors_origins, "allowed cors origins");

        let dispatcher = self.dispatcher.clone();
        let callbacks = Arc::clone(&self.connection_callbacks);
        let enable_sockets = self.enable_sockets;

        Ok(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let (socket, peer_addr) = match accepted {
                            Ok(pair) => pair,
                            Err(err) => {
                                warn!(error = %err, "accept failed");
                                continue;
                            }
                        };
                        debug!(%peer_addr, "inbound connection");
                        let dispatcher = dispatcher.clone();
                        let callbacks = Arc::clone(&callbacks);
                        tokio::spawn(async move {
                            accept_connection(socket, dispatcher, callbacks, enable_sockets).await;
                        });
                    }
                }
            }
            info!("stopped accepting connections");
        })
    }

    /// Ceases accepting connections. Connections already established keep
    /// running until their peers disconnect.
    pub fn stop(&self) -> Result<(), ServerError> {
        let sender = self
            .shutdown_signal
            .lock()
            .expect("shutdown signal lock poisoned")
            .take()
            .ok_or(ServerError::NotRunning)?;
        sender.send(()).map_err(|_| ServerError::ShutdownFailed)
    }
}

/// Performs the role handshake, then hands the connection to the drive task.
/// A peer that sends anything but a role announcement first is rejected.
async fn accept_connection(
    socket: TcpStream,
    dispatcher: Dispatcher,
    callbacks: ConnectionCallbacks,
    enable_sockets: bool,
) {
    use futures::StreamExt;

    let mut framed = Framed::new(socket, LengthDelimitedCodec::new());
    let first = match framed.next().await {
        Some(Ok(bytes)) => bytes,
        Some(Err(err)) => {
            warn!(error = %err, "read failed before handshake");
            return;
        }
        None => {
            warn!("connection closed before handshake");
            return;
        }
    };
    let role = match Frame::try_from(first.freeze()) {
        Ok(Frame::Hello { role }) => role,
        Ok(_) => {
            warn!("first frame was not a role announcement, rejecting connection");
            return;
        }
        Err(err) => {
            warn!(error = %err, "could not decode handshake frame");
            return;
        }
    };

    let channel = spawn_connection(framed, dispatcher);

    if !enable_sockets {
        debug!(role, "sockets disabled, connection serves requests only");
        return;
    }
    let accepted = Accepted { role, channel };
    let callbacks = callbacks
        .lock()
        .expect("connection callback lock poisoned");
    for callback in callbacks.iter() {
        callback(&accepted);
    }
}
