use std::collections::HashMap;

use tracing::warn;

use crate::dispatch::{BindingMode, Dispatcher};
use crate::handler::RawHandler;

/// Outcome of binding a function to a path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindStatus {
    /// No dispatcher attached yet; the binding is buffered and will be
    /// registered on attach.
    Buffered,
    /// Registered on the live dispatcher.
    Registered,
    /// Registered, replacing an earlier binding under the same path.
    Replaced,
}

enum State {
    /// Bindings set before a dispatcher exists, keyed by path so that
    /// rebinding before attach already applies last-write-wins.
    Unattached(HashMap<String, (BindingMode, RawHandler)>),
    Attached(Dispatcher),
}

/// Per-node registration state shared by every generated Registrar construct.
///
/// Lifecycle is a one-way state machine: Unattached buffers bindings,
/// attaching flushes them through the dispatcher, and every later bind
/// registers immediately. There is no detach.
pub struct RegistrarCore {
    state: State,
}

impl RegistrarCore {
    pub fn new() -> Self {
        RegistrarCore {
            state: State::Unattached(HashMap::new()),
        }
    }

    pub fn bind(&mut self, mode: BindingMode, path: &str, handler: RawHandler) -> BindStatus {
        match &mut self.state {
            State::Unattached(pending) => {
                let replaced = pending.insert(path.to_string(), (mode, handler)).is_some();
                if replaced {
                    BindStatus::Replaced
                } else {
                    BindStatus::Buffered
                }
            }
            State::Attached(dispatcher) => {
                if dispatcher.register(mode, path, handler) {
                    BindStatus::Replaced
                } else {
                    BindStatus::Registered
                }
            }
        }
    }

    /// Transitions to Attached, flushing buffered bindings. Attaching twice
    /// is ignored; the lifecycle has no detach.
    pub fn attach(&mut self, dispatcher: &Dispatcher) {
        match &mut self.state {
            State::Unattached(pending) => {
                for (path, (mode, handler)) in pending.drain() {
                    dispatcher.register(mode, path, handler);
                }
                self.state = State::Attached(dispatcher.clone());
            }
            State::Attached(_) => {
                warn!("registrar already attached, ignoring second attach");
            }
        }
    }
}

impl Default for RegistrarCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::raw_handler;
    use serde_json::json;

    #[tokio::test]
    async fn buffers_until_attached_then_flushes() {
        let mut core = RegistrarCore::new();
        let status = core.bind(
            BindingMode::Handler,
            "auth/test1",
            raw_handler(|| async { 1i64 }),
        );
        assert_eq!(status, BindStatus::Buffered);

        let dispatcher = Dispatcher::new();
        core.attach(&dispatcher);
        let result = dispatcher.dispatch("auth/test1", vec![]).await.unwrap();
        assert_eq!(result, json!(1));
    }

    #[tokio::test]
    async fn rebinding_before_attach_keeps_only_the_latest() {
        let mut core = RegistrarCore::new();
        core.bind(
            BindingMode::Handler,
            "auth/test1",
            raw_handler(|| async { "old".to_string() }),
        );
        let status = core.bind(
            BindingMode::Handler,
            "auth/test1",
            raw_handler(|| async { "new".to_string() }),
        );
        assert_eq!(status, BindStatus::Replaced);

        let dispatcher = Dispatcher::new();
        core.attach(&dispatcher);
        let result = dispatcher.dispatch("auth/test1", vec![]).await.unwrap();
        assert_eq!(result, json!("new"));
    }

    #[tokio::test]
    async fn binds_register_immediately_once_attached() {
        let mut core = RegistrarCore::new();
        let dispatcher = Dispatcher::new();
        core.attach(&dispatcher);

        let status = core.bind(
            BindingMode::Callback,
            "api/test3",
            raw_handler(|| async {}),
        );
        assert_eq!(status, BindStatus::Registered);
        let status = core.bind(
            BindingMode::Callback,
            "api/test3",
            raw_handler(|| async {}),
        );
        assert_eq!(status, BindStatus::Replaced);
        assert!(dispatcher.dispatch("api/test3", vec![]).await.is_ok());
    }
}
