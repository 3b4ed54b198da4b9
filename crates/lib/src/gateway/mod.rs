//! Gateway: the VK Callback API endpoint.
//!
//! Every request is decoded and checked (version, then secret) inline. The confirmation
//! handshake is answered directly; other events are acknowledged with `ok` and processed in a
//! detached task.

mod dispatcher;
mod protocol;
mod server;

pub use dispatcher::{Acceptance, Dispatcher, Outcome, RelaySettings};
pub use protocol::{CallbackRequest, EventType, InboundEvent, ProtocolError};
pub use server::{build_dispatcher, router, run_gateway};
