//! ZeroMQ transports: a lockstep REQ socket for requests and a SUB socket for broadcasts.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use crate::error::{ChatError, ChatResult};
use crate::transport::{Frame, FrameSource, RequestTransport};

/// Request/reply over a REQ socket.
///
/// A REQ socket must strictly alternate send and receive. The socket lives behind a
/// mutex held for the whole exchange, so concurrent callers are serialized. After a
/// timeout or I/O failure the socket is dropped and a fresh one is connected on the
/// next call; a late reply can then never be read as the answer to a later request.
pub struct SocketRequestTransport {
    endpoint: String,
    timeout: Duration,
    socket: Mutex<Option<ReqSocket>>,
}

impl SocketRequestTransport {
    /// Connect to the request endpoint (e.g. `tcp://localhost:5555`).
    pub async fn connect(endpoint: &str, timeout: Duration) -> ChatResult<Self> {
        let socket = open_req(endpoint, timeout).await?;
        info!(endpoint = %endpoint, "request socket connected");
        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout,
            socket: Mutex::new(Some(socket)),
        })
    }
}

async fn open_req(endpoint: &str, timeout: Duration) -> ChatResult<ReqSocket> {
    let mut socket = ReqSocket::new();
    tokio::time::timeout(timeout, socket.connect(endpoint))
        .await
        .map_err(|_| ChatError::Transport(format!("connect to {} timed out", endpoint)))??;
    Ok(socket)
}

async fn round_trip(socket: &mut ReqSocket, request: Vec<u8>) -> ChatResult<Vec<u8>> {
    socket.send(ZmqMessage::from(request)).await?;
    let reply = socket.recv().await?;
    reply
        .into_vec()
        .into_iter()
        .next()
        .map(|part| part.to_vec())
        .ok_or_else(|| ChatError::Decode("reply has no frames".to_string()))
}

#[async_trait]
impl RequestTransport for SocketRequestTransport {
    async fn exchange(&self, request: Vec<u8>) -> ChatResult<Vec<u8>> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            debug!(endpoint = %self.endpoint, "reconnecting request socket");
            *guard = Some(open_req(&self.endpoint, self.timeout).await?);
        }
        let Some(socket) = guard.as_mut() else {
            return Err(ChatError::Closed);
        };

        match tokio::time::timeout(self.timeout, round_trip(socket, request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                warn!(endpoint = %self.endpoint, error = %e, "request exchange failed");
                *guard = None;
                Err(e)
            }
            Err(_) => {
                warn!(endpoint = %self.endpoint, timeout = ?self.timeout, "no reply in time");
                *guard = None;
                Err(ChatError::Transport(format!(
                    "no reply within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

/// Broadcast frames from a SUB socket. Filtering at the socket is by topic prefix.
pub struct SocketFrameSource {
    endpoint: String,
    socket: SubSocket,
}

impl SocketFrameSource {
    /// Connect to the broadcast endpoint (e.g. `tcp://localhost:5558`).
    pub async fn connect(endpoint: &str, timeout: Duration) -> ChatResult<Self> {
        let mut socket = SubSocket::new();
        tokio::time::timeout(timeout, socket.connect(endpoint))
            .await
            .map_err(|_| ChatError::Transport(format!("connect to {} timed out", endpoint)))??;
        info!(endpoint = %endpoint, "subscribe socket connected");
        Ok(Self {
            endpoint: endpoint.to_string(),
            socket,
        })
    }
}

#[async_trait]
impl FrameSource for SocketFrameSource {
    async fn subscribe(&mut self, topic: &str) -> ChatResult<()> {
        self.socket.subscribe(topic).await?;
        debug!(endpoint = %self.endpoint, topic = %topic, "subscribed");
        Ok(())
    }

    async fn next_frame(&mut self) -> ChatResult<Option<Frame>> {
        let message = self.socket.recv().await?;
        Ok(Some(
            message
                .into_vec()
                .into_iter()
                .map(|part| part.to_vec())
                .collect(),
        ))
    }
}
