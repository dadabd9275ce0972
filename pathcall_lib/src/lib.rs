//! Runtime for pathcall generated code: the path-addressed dispatch
//! contract (register / call / connect), the role handshake, and the TCP
//! transport roots the generated Server/Target constructs compose with.
//!
//! The construct trees themselves are generated by the `pathcall_macro`
//! crate from a `.schema` interface file.

pub mod internal_for_macro;

pub use channel::CallChannel;
pub use dispatch::{BindingMode, Dispatcher};
pub use error::{CallError, HandlerError, ServerError};
pub use handler::{raw_handler, FromParams, Handler, RawHandler};
pub use messages::{Frame, RequestId, WireError};
pub use registrar::{BindStatus, RegistrarCore};
pub use server::{Accepted, Server, ServerOptions};
pub use target::{Target, TargetOptions};

mod channel;
mod connection;
mod dispatch;
mod error;
mod handler;
mod messages;
mod registrar;
mod server;
mod target;
