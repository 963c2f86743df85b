//! Chat session: the seven client operations over the two transports.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::{ChatError, ChatResult};
use crate::models::{Delivery, RequestEnvelope, ResponseEnvelope, Service, Topic};
use crate::services::subscription::{
    spawn_listener, subscription_channel, ListenerHandle, SubscriptionControl, Subscriptions,
};
use crate::transport::{FrameSource, RequestTransport};

/// Status the server returns for a successful login or channel creation.
pub const STATUS_SUCCESS: &str = "sucesso";
/// Status the server returns for a successful publish or direct message.
pub const STATUS_OK: &str = "OK";

/// One logical chat session: a request transport, a subscription set, and the logged-in user.
pub struct ChatSession {
    transport: Arc<dyn RequestTransport>,
    subscriptions: Subscriptions,
    control: Option<SubscriptionControl>,
    username: Option<String>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn RequestTransport>) -> Self {
        let (subscriptions, control) = subscription_channel();
        Self {
            transport,
            subscriptions,
            control: Some(control),
            username: None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    fn require_user(&self) -> ChatResult<&str> {
        self.username.as_deref().ok_or(ChatError::NotLoggedIn)
    }

    /// Stamp, encode, exchange, decode.
    async fn call(&self, mut request: RequestEnvelope) -> ChatResult<ResponseEnvelope> {
        request.stamp();
        let bytes = request.encode()?;
        let reply = self.transport.exchange(bytes).await?;
        let response = ResponseEnvelope::decode(&reply)?;
        debug!(
            service = request.service().as_str(),
            status = %response.status(),
            "reply received"
        );
        Ok(response)
    }

    fn expect_status(response: &ResponseEnvelope, expected: &str) -> ChatResult<()> {
        let status = response.status();
        if status == expected {
            Ok(())
        } else {
            Err(ChatError::Application {
                status,
                description: response.failure_text(),
            })
        }
    }

    #[instrument(skip(self))]
    pub async fn login(&mut self, user: &str) -> ChatResult<()> {
        let request = RequestEnvelope::new(Service::Login).with("user", user);
        let response = self.call(request).await?;
        Self::expect_status(&response, STATUS_SUCCESS)?;
        self.username = Some(user.to_string());
        info!(user = %user, "logged in");
        Ok(())
    }

    /// Registered usernames. The reply carries no status.
    pub async fn list_users(&self) -> ChatResult<Vec<String>> {
        let response = self.call(RequestEnvelope::new(Service::Users)).await?;
        Ok(response.users())
    }

    #[instrument(skip(self))]
    pub async fn create_channel(&self, channel: &str) -> ChatResult<()> {
        let request = RequestEnvelope::new(Service::Channel).with("channel", channel);
        let response = self.call(request).await?;
        Self::expect_status(&response, STATUS_SUCCESS)?;
        info!(channel = %channel, "channel created");
        Ok(())
    }

    /// Channel names. The server reuses the `users` field for them.
    pub async fn list_channels(&self) -> ChatResult<Vec<String>> {
        let response = self.call(RequestEnvelope::new(Service::Channels)).await?;
        Ok(response.users())
    }

    #[instrument(skip(self, message))]
    pub async fn publish(&self, channel: &str, message: &str) -> ChatResult<()> {
        let user = self.require_user()?;
        let request = RequestEnvelope::new(Service::Publish)
            .with("user", user)
            .with("channel", channel)
            .with("message", message);
        let response = self.call(request).await?;
        Self::expect_status(&response, STATUS_OK)?;
        debug!(channel = %channel, "published");
        Ok(())
    }

    #[instrument(skip(self, message))]
    pub async fn send_message(&self, dst: &str, message: &str) -> ChatResult<()> {
        let src = self.require_user()?;
        let request = RequestEnvelope::new(Service::Message)
            .with("src", src)
            .with("dst", dst)
            .with("message", message);
        let response = self.call(request).await?;
        Self::expect_status(&response, STATUS_OK)?;
        debug!(dst = %dst, "direct message sent");
        Ok(())
    }

    /// Start receiving broadcasts for `channel`. Does not wait for the broker.
    pub async fn subscribe_to_channel(&self, channel: &str) {
        self.subscriptions.subscribe(&Topic::channel(channel)).await;
    }

    /// Start receiving direct messages for the logged-in user.
    pub async fn subscribe_to_user(&self) -> ChatResult<()> {
        let user = self.require_user()?;
        self.subscriptions.subscribe(&Topic::user(user)).await;
        Ok(())
    }

    /// Classify and decode one broadcast frame. Unrecognized topics and undecodable
    /// payloads yield `None`; the latter are logged.
    pub fn on_delivery(topic: &str, payload: &[u8]) -> Option<Delivery> {
        let kind = Topic::classify(topic);
        match Delivery::decode(&kind, payload) {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(topic = %topic, error = %e, "broadcast skipped");
                None
            }
        }
    }

    /// Spawn the receive loop over `source`, forwarding decoded deliveries to `sink`
    /// in arrival order. Can be called once per session.
    pub fn start_listener<S>(
        &mut self,
        source: S,
        sink: mpsc::UnboundedSender<Delivery>,
    ) -> ChatResult<ListenerHandle>
    where
        S: FrameSource + 'static,
    {
        let control = self.control.take().ok_or(ChatError::Closed)?;
        let handle = spawn_listener(source, control, move |topic, payload| {
            if let Some(delivery) = Self::on_delivery(topic, payload) {
                if sink.send(delivery).is_err() {
                    debug!("delivery sink closed");
                }
            }
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeServer;
    use crate::transport::MemoryBroker;
    use std::time::Duration;

    fn session_with(server: &FakeServer) -> ChatSession {
        ChatSession::new(Arc::new(server.clone()))
    }

    #[tokio::test]
    async fn login_then_list_users() {
        let server = FakeServer::new();
        let mut session = session_with(&server);

        session.login("alice").await.unwrap();
        assert_eq!(session.username(), Some("alice"));
        assert_eq!(session.list_users().await.unwrap(), vec!["alice".to_string()]);

        let sent = server.requests();
        assert_eq!(sent[0]["service"], "login");
        assert_eq!(sent[0]["data"]["user"], "alice");
        assert!(sent[0]["data"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn duplicate_login_surfaces_description() {
        let server = FakeServer::new();
        session_with(&server).login("alice").await.unwrap();

        let mut second = session_with(&server);
        let err = second.login("alice").await.unwrap_err();
        match err {
            ChatError::Application {
                status,
                description,
            } => {
                assert_eq!(status, "erro");
                assert_eq!(description, "Usuário já existe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(second.username().is_none());
    }

    #[tokio::test]
    async fn create_and_list_channels() {
        let server = FakeServer::new();
        let session = session_with(&server);
        session.create_channel("general").await.unwrap();
        assert!(session
            .list_channels()
            .await
            .unwrap()
            .contains(&"general".to_string()));
    }

    #[tokio::test]
    async fn publish_requires_login() {
        let server = FakeServer::new();
        let session = session_with(&server);
        assert!(matches!(
            session.publish("general", "hi").await,
            Err(ChatError::NotLoggedIn)
        ));
        assert!(matches!(
            session.subscribe_to_user().await,
            Err(ChatError::NotLoggedIn)
        ));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_reads_message_field() {
        let server = FakeServer::new();
        let mut session = session_with(&server);
        session.login("alice").await.unwrap();

        let err = session.publish("nowhere", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Application { ref description, .. } if description == "Canal não existe"
        ));
    }

    #[tokio::test]
    async fn send_message_uses_src_and_dst() {
        let server = FakeServer::new();
        let mut bob = session_with(&server);
        bob.login("bob").await.unwrap();
        let mut alice = session_with(&server);
        alice.login("alice").await.unwrap();

        alice.send_message("bob", "psst").await.unwrap();
        let last = server.requests().pop().unwrap();
        assert_eq!(last["service"], "message");
        assert_eq!(last["data"]["src"], "alice");
        assert_eq!(last["data"]["dst"], "bob");
        assert_eq!(last["data"]["message"], "psst");
    }

    #[test]
    fn on_delivery_ignores_unrecognized_and_malformed() {
        assert!(ChatSession::on_delivery("foo", br#"{"user":"bob","message":"hi"}"#).is_none());
        assert!(ChatSession::on_delivery("canal_general", b"{not json").is_none());
        let delivery =
            ChatSession::on_delivery("canal_general", br#"{"user":"bob","message":"hi"}"#)
                .unwrap();
        assert_eq!(delivery.sender(), "bob");
    }

    #[tokio::test]
    async fn listener_delivers_channel_and_direct_messages() {
        let broker = MemoryBroker::new(32);
        let server = FakeServer::with_broker(broker.clone());
        let mut session = session_with(&server);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _listener = session.start_listener(broker.source(), tx).unwrap();

        session.login("alice").await.unwrap();
        session.create_channel("general").await.unwrap();
        session.subscribe_to_channel("general").await;
        session.subscribe_to_user().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.publish("general", "hello").await.unwrap();
        session.send_message("alice", "note to self").await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            first.render(),
            "[2024-05-01T12:00:00] #general <alice> hello"
        );
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(second, Delivery::Direct { ref src, .. } if src == "alice"));
    }

    #[tokio::test]
    async fn listener_starts_once() {
        let broker = MemoryBroker::new(4);
        let mut session = session_with(&FakeServer::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let _first = session.start_listener(broker.source(), tx.clone()).unwrap();
        assert!(matches!(
            session.start_listener(broker.source(), tx),
            Err(ChatError::Closed)
        ));
    }
}
