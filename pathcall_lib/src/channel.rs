use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::CallError;
use crate::messages::{Frame, RequestId};

pub(crate) type PendingMap =
    Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, CallError>>>>>;

/// The call side of the dispatch contract, bound to one live connection.
///
/// Cloning is cheap; every Proxy construct of a tree shares one channel.
/// Concurrent in-flight calls are correlated by request id, so replies may
/// resolve in any order.
#[derive(Clone)]
pub struct CallChannel {
    outbound: mpsc::UnboundedSender<Frame>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl CallChannel {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<Frame>, pending: PendingMap) -> Self {
        CallChannel {
            outbound,
            pending,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sends a request for `path` and suspends until the correlated reply.
    ///
    /// Fails fast with [`CallError::TransportUnavailable`] when the
    /// connection task is gone instead of queueing indefinitely. An issued
    /// call cannot be cancelled; dropping the future merely abandons the
    /// reply.
    pub async fn call(&self, path: &str, params: Vec<Value>) -> Result<Value, CallError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("pending call map lock poisoned");
            pending.insert(id, reply_tx);
        }

        let frame = Frame::Request {
            id,
            path: path.to_string(),
            params,
        };
        if self.outbound.send(frame).is_err() {
            let mut pending = self.pending.lock().expect("pending call map lock poisoned");
            pending.remove(&id);
            return Err(CallError::TransportUnavailable);
        }

        match reply_rx.await {
            Ok(result) => result,
            // Sender dropped: the connection died with this call in flight.
            Err(_) => Err(CallError::ConnectionClosed),
        }
    }
}
