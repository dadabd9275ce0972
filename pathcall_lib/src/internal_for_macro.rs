#![doc(hidden)]
//! This module is for internal usage by the pathcall_macro crate only.
//!
//! Contains various exports that generated code needs access to.

pub use crate::channel::CallChannel;
pub use crate::dispatch::{BindingMode, Dispatcher};
pub use crate::handler::{raw_handler, FromParams, Handler, RawHandler};
pub use crate::registrar::{BindStatus, RegistrarCore};

pub use serde_json::{from_value, to_value, Value};

/// Called by generated `on_connection` glue for peers announcing a role
/// outside the schema's counterpart list. Observable by design; the
/// connection itself is discarded.
pub fn unmatched_role(own_role: &str, announced: &str) {
    tracing::warn!(
        own_role,
        announced,
        "connection announced an unrecognized counterpart role, ignoring"
    );
}
