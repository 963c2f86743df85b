//! Transports: request/reply exchanges and the broadcast frame source.
//!
//! ```text
//! RequestTransport (trait)          FrameSource (trait)
//!     ├── HttpTransport                 ├── SocketFrameSource (SUB)
//!     └── SocketRequestTransport (REQ)  └── MemoryFrameSource (in-process)
//! ```

pub mod http;
pub mod memory;
pub mod socket;

use async_trait::async_trait;

use crate::error::ChatResult;

pub use http::HttpTransport;
pub use memory::{MemoryBroker, MemoryFrameSource};
pub use socket::{SocketFrameSource, SocketRequestTransport};

/// One multipart unit received on the subscribe channel. A well-formed broadcast
/// has exactly two parts: topic and JSON payload.
pub type Frame = Vec<Vec<u8>>;

/// A synchronous request/reply channel.
///
/// Each call sends one encoded request and returns the reply correlated with it.
/// Implementations over lockstep sockets must never let two exchanges overlap.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn exchange(&self, request: Vec<u8>) -> ChatResult<Vec<u8>>;
}

/// Source of broadcast frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Ask the source to deliver frames for `topic`. Fire-and-forget.
    async fn subscribe(&mut self, topic: &str) -> ChatResult<()>;

    /// Next frame. `Ok(None)` on orderly shutdown, `Err` when the connection is lost.
    async fn next_frame(&mut self) -> ChatResult<Option<Frame>>;
}
