//! In-process broadcast source: a tokio broadcast channel standing in for a PUB broker.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::ChatResult;
use crate::transport::{Frame, FrameSource};

/// Publishing side. Cloning shares the same channel.
#[derive(Clone)]
pub struct MemoryBroker {
    tx: broadcast::Sender<Frame>,
}

impl MemoryBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a two-part `(topic, payload)` frame. Returns the number of live sources.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> usize {
        self.publish_frame(vec![topic.as_bytes().to_vec(), payload.to_vec()])
    }

    /// Publish an arbitrary frame, well-formed or not.
    pub fn publish_frame(&self, frame: Frame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    /// New source; it only sees frames published after this call.
    pub fn source(&self) -> MemoryFrameSource {
        MemoryFrameSource {
            rx: self.tx.subscribe(),
            prefixes: Vec::new(),
        }
    }
}

/// Receiving side. Filters by topic prefix the way a SUB socket does.
pub struct MemoryFrameSource {
    rx: broadcast::Receiver<Frame>,
    prefixes: Vec<Vec<u8>>,
}

impl MemoryFrameSource {
    fn wants(&self, frame: &Frame) -> bool {
        let topic = frame.first().map(Vec::as_slice).unwrap_or_default();
        self.prefixes.iter().any(|p| topic.starts_with(p))
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn subscribe(&mut self, topic: &str) -> ChatResult<()> {
        let prefix = topic.as_bytes().to_vec();
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        Ok(())
    }

    async fn next_frame(&mut self) -> ChatResult<Option<Frame>> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if self.wants(&frame) => return Ok(Some(frame)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "memory source lagged; frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_subscribed_prefixes() {
        let broker = MemoryBroker::new(16);
        let mut source = broker.source();
        source.subscribe("canal_tech").await.unwrap();

        broker.publish("canal_general", b"{}");
        broker.publish("canal_tech", b"{\"n\":1}");

        let frame = source.next_frame().await.unwrap().unwrap();
        assert_eq!(frame[0], b"canal_tech".to_vec());
        assert_eq!(frame[1], b"{\"n\":1}".to_vec());
    }

    #[tokio::test]
    async fn closed_broker_ends_source() {
        let broker = MemoryBroker::new(4);
        let mut source = broker.source();
        drop(broker);
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
