use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::handler::RawHandler;
use crate::messages::WireError;

/// How a binding was declared in the schema. Both modes are registered and
/// dispatched identically; the tag is kept for observability, since the
/// distinction may gain semantics later.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindingMode {
    Handler,
    Callback,
}

/// The registration side of the dispatch contract: a shared map from
/// dispatch path to binding.
///
/// Registration never blocks and is valid at any time, including before the
/// transport runs. Registering under an occupied path replaces the previous
/// binding (last writer wins); bindings never accumulate under one path.
#[derive(Clone, Default)]
pub struct Dispatcher {
    bindings: Arc<RwLock<HashMap<String, RawHandler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` under `path`. Returns whether a previous binding was
    /// replaced.
    pub fn register(&self, mode: BindingMode, path: impl Into<String>, handler: RawHandler) -> bool {
        let path = path.into();
        let replaced = self
            .bindings
            .write()
            .expect("binding map lock poisoned")
            .insert(path.clone(), handler)
            .is_some();
        debug!(?mode, path, replaced, "registered binding");
        replaced
    }

    /// Routes one inbound request to its binding.
    pub(crate) async fn dispatch(&self, path: &str, params: Vec<Value>) -> Result<Value, WireError> {
        let handler = {
            let bindings = self.bindings.read().expect("binding map lock poisoned");
            bindings.get(path).cloned()
        };
        let handler = match handler {
            Some(handler) => handler,
            None => {
                return Err(WireError::UnregisteredPath {
                    path: path.to_string(),
                })
            }
        };
        // The lock is released before the binding runs; a slow handler must
        // not block registration or other dispatches.
        handler(params).await.map_err(|err| WireError::Handler {
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::raw_handler;
    use serde_json::json;

    #[tokio::test]
    async fn dispatches_to_registered_binding() {
        let dispatcher = Dispatcher::new();
        let replaced = dispatcher.register(
            BindingMode::Handler,
            "api/ping",
            raw_handler(|| async { "PONG".to_string() }),
        );
        assert!(!replaced);

        let result = dispatcher.dispatch("api/ping", vec![]).await.unwrap();
        assert_eq!(result, json!("PONG"));
    }

    #[tokio::test]
    async fn unregistered_path_is_an_error_not_a_hang() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher.dispatch("api/missing", vec![]).await.unwrap_err();
        assert_eq!(
            err,
            WireError::UnregisteredPath {
                path: "api/missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn re_registering_replaces_last_write_wins() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(
            BindingMode::Handler,
            "api/ping",
            raw_handler(|| async { "first".to_string() }),
        );
        let replaced = dispatcher.register(
            BindingMode::Handler,
            "api/ping",
            raw_handler(|| async { "second".to_string() }),
        );
        assert!(replaced);

        let result = dispatcher.dispatch("api/ping", vec![]).await.unwrap();
        assert_eq!(result, json!("second"));
    }
}
