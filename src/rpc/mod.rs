//! Cross-process proxying of tracker operations.

mod manager;
mod protocol;
mod transport;

pub use manager::{run_if_manager, serve, Manager, MANAGER_ENV};
pub use protocol::{ErrorKind, Request, Response};
pub use transport::{channel_pair, ChannelClient, ChannelServer, ClientTransport, ServerTransport, StreamClient, StreamServer};
