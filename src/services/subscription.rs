//! Subscription set and the broadcast receive loop.
//!
//! The session appends topics through [`Subscriptions`]; the listener task reads the
//! same set to filter frames and applies new topics to its [`FrameSource`]. Frames are
//! dispatched one at a time in arrival order.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{Frame, FrameSource};

/// Exact topic strings the session asked for. Append-only for the life of the session.
#[derive(Clone, Default, Debug)]
pub struct SubscriptionSet {
    topics: Arc<RwLock<BTreeSet<String>>>,
}

impl SubscriptionSet {
    /// Returns `true` if the topic was not present before.
    async fn insert(&self, topic: &str) -> bool {
        let mut topics = self.topics.write().await;
        topics.insert(topic.to_string())
    }

    pub async fn contains(&self, topic: &str) -> bool {
        self.topics.read().await.contains(topic)
    }

    pub async fn topics(&self) -> Vec<String> {
        self.topics.read().await.iter().cloned().collect()
    }
}

/// Session-side handle: records topics and forwards new ones to the listener.
#[derive(Clone, Debug)]
pub struct Subscriptions {
    set: SubscriptionSet,
    control: mpsc::UnboundedSender<String>,
}

/// Listener-side end of the subscription channel.
#[derive(Debug)]
pub struct SubscriptionControl {
    set: SubscriptionSet,
    commands: mpsc::UnboundedReceiver<String>,
}

/// Create a linked subscription handle and listener control.
pub fn subscription_channel() -> (Subscriptions, SubscriptionControl) {
    let set = SubscriptionSet::default();
    let (control, commands) = mpsc::unbounded_channel();
    (
        Subscriptions {
            set: set.clone(),
            control,
        },
        SubscriptionControl { set, commands },
    )
}

impl Subscriptions {
    /// Register interest in `topic`. Idempotent; returns `true` when newly added.
    /// Topics added before the listener starts are applied when it does.
    pub async fn subscribe(&self, topic: &str) -> bool {
        let added = self.set.insert(topic).await;
        if added {
            if self.control.send(topic.to_string()).is_err() {
                debug!(topic = %topic, "listener gone; topic recorded only");
            }
            info!(topic = %topic, "subscribed");
        }
        added
    }

    pub fn set(&self) -> &SubscriptionSet {
        &self.set
    }
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// The source shut down in an orderly way.
    SourceClosed,
    /// Cancelled through the handle, or the session went away.
    Cancelled,
    /// The connection failed; nothing is retried.
    ConnectionLost(String),
}

/// Running receive loop. Dropping the handle cancels the loop.
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<ListenerExit>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ListenerHandle {
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end and report why.
    pub async fn join(mut self) -> ListenerExit {
        let shutdown = self.shutdown.take();
        let exit = match (&mut self.task).await {
            Ok(exit) => exit,
            Err(e) => ListenerExit::ConnectionLost(format!("listener task failed: {}", e)),
        };
        drop(shutdown);
        exit
    }
}

/// Spawn the receive loop on its own task. `on_frame(topic, payload)` runs only for
/// subscribed topics, strictly sequentially.
pub fn spawn_listener<S, F>(source: S, control: SubscriptionControl, on_frame: F) -> ListenerHandle
where
    S: FrameSource + 'static,
    F: FnMut(&str, &[u8]) + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_receive_loop(source, control, shutdown_rx, on_frame));
    ListenerHandle {
        task,
        shutdown: Some(shutdown_tx),
    }
}

enum LoopEvent {
    Shutdown,
    Subscribe(Option<String>),
    Frame(crate::error::ChatResult<Option<Frame>>),
}

async fn run_receive_loop<S, F>(
    mut source: S,
    mut control: SubscriptionControl,
    mut shutdown: oneshot::Receiver<()>,
    mut on_frame: F,
) -> ListenerExit
where
    S: FrameSource,
    F: FnMut(&str, &[u8]),
{
    info!("listener started");
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => LoopEvent::Shutdown,
            command = control.commands.recv() => LoopEvent::Subscribe(command),
            frame = source.next_frame() => LoopEvent::Frame(frame),
        };

        match event {
            LoopEvent::Shutdown => {
                info!("listener cancelled");
                return ListenerExit::Cancelled;
            }
            LoopEvent::Subscribe(Some(topic)) => {
                if let Err(e) = source.subscribe(&topic).await {
                    warn!(topic = %topic, error = %e, "subscribe request failed");
                }
            }
            LoopEvent::Subscribe(None) => {
                info!("session dropped; listener stopping");
                return ListenerExit::Cancelled;
            }
            LoopEvent::Frame(Ok(Some(frame))) => {
                dispatch_frame(&control.set, frame, &mut on_frame).await;
            }
            LoopEvent::Frame(Ok(None)) => {
                info!("broadcast source closed");
                return ListenerExit::SourceClosed;
            }
            LoopEvent::Frame(Err(e)) => {
                warn!(error = %e, "broadcast connection lost");
                return ListenerExit::ConnectionLost(e.to_string());
            }
        }
    }
}

async fn dispatch_frame<F>(set: &SubscriptionSet, frame: Frame, on_frame: &mut F)
where
    F: FnMut(&str, &[u8]),
{
    let mut parts = frame.into_iter();
    let Some(topic) = parts.next() else {
        warn!("empty frame skipped");
        return;
    };
    let Ok(topic) = String::from_utf8(topic) else {
        warn!("frame topic is not utf-8; skipped");
        return;
    };
    let Some(payload) = parts.next() else {
        warn!(topic = %topic, "frame missing payload part; skipped");
        return;
    };
    if !set.contains(&topic).await {
        // SUB filtering is by prefix; `user_bob` also matches `user_bobby`.
        debug!(topic = %topic, "frame for unsubscribed topic dropped");
        return;
    }
    on_frame(topic.as_str(), payload.as_slice());
}
