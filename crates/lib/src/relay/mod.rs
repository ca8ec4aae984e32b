//! Message relay: the long-lived background process between UI surfaces and external services.
//!
//! Single port serves HTTP and WebSocket. Requests are `{id?, action, query?}` frames; each one
//! is answered by exactly one `{id?, success, ...}` response. Handlers hold no state across requests.

mod client;
mod handler;
mod protocol;
mod server;

pub use client::{request_once, RelayClient, RelayClientError};
pub use handler::{Dispatch, Relay};
pub use protocol::{parse_frame, FrameError, RelayRequest, RelayResponse, PROTOCOL_VERSION};
pub use server::{run_relay, serve_relay};
