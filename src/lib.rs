//! Chat client for a service reachable over two transports.
//!
//! Requests (login, directory lookups, channel creation, message submission) go
//! over a lockstep request/reply channel, either HTTP or a REQ socket. Channel
//! broadcasts and direct messages arrive independently on a subscribe channel as
//! `(topic, payload)` frames and are dispatched by a background receive loop.

pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use config::Config;
pub use error::{ChatError, ChatResult};
pub use models::{Delivery, Topic};
pub use services::{ChatSession, ListenerExit, ListenerHandle};

use std::sync::Arc;

use config::TransportKind;
use transport::{HttpTransport, RequestTransport, SocketFrameSource, SocketRequestTransport};

/// Build a session for the configured request/reply variant and connect the
/// broadcast source. Used by the binary; tests wire sessions directly.
pub async fn connect(config: &Config) -> ChatResult<(ChatSession, SocketFrameSource)> {
    let transport: Arc<dyn RequestTransport> = match config.transport {
        TransportKind::Http => Arc::new(HttpTransport::new(
            &config.server_url,
            config.request_timeout,
        )?),
        TransportKind::Socket => Arc::new(
            SocketRequestTransport::connect(&config.request_endpoint, config.request_timeout)
                .await?,
        ),
    };
    let source =
        SocketFrameSource::connect(&config.broadcast_endpoint, config.request_timeout).await?;
    tracing::info!(transport = ?config.transport, "chat client connected");
    Ok((ChatSession::new(transport), source))
}
