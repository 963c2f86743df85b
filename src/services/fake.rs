//! In-process stand-in for the chat server, used by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ChatError, ChatResult};
use crate::models::Topic;
use crate::transport::{MemoryBroker, RequestTransport};

#[derive(Default)]
struct FakeState {
    users: Vec<String>,
    channels: Vec<String>,
    requests: Vec<Value>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<FakeState>>,
    broker: Option<MemoryBroker>,
}

impl FakeServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_broker(broker: MemoryBroker) -> Self {
        Self {
            broker: Some(broker),
            ..Self::default()
        }
    }

    pub(crate) fn seed_channel(&self, channel: &str) {
        self.state.lock().unwrap().channels.push(channel.to_string());
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().requests.clone()
    }

    fn handle(&self, request: Value) -> Value {
        let service = request["service"].as_str().unwrap_or_default().to_string();
        let data = request["data"].clone();
        let text = |key: &str| data[key].as_str().unwrap_or_default().to_string();

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        let reply = match service.as_str() {
            "login" => {
                let user = text("user");
                if user.is_empty() || state.users.contains(&user) {
                    json!({"status": "erro", "description": "Usuário já existe"})
                } else {
                    state.users.push(user);
                    json!({"status": "sucesso"})
                }
            }
            "users" => json!({ "users": state.users }),
            "channel" => {
                let channel = text("channel");
                if channel.is_empty() || state.channels.contains(&channel) {
                    json!({"status": "erro", "description": "Canal já existe"})
                } else {
                    state.channels.push(channel);
                    json!({"status": "sucesso"})
                }
            }
            "channels" => json!({ "users": state.channels }),
            "publish" => {
                let channel = text("channel");
                if !state.channels.contains(&channel) {
                    json!({"status": "erro", "message": "Canal não existe"})
                } else {
                    if let Some(broker) = &self.broker {
                        let payload = json!({
                            "user": text("user"),
                            "message": text("message"),
                            "timestamp": "2024-05-01T12:00:00",
                        });
                        broker.publish(&Topic::channel(&channel), payload.to_string().as_bytes());
                    }
                    json!({"status": "OK"})
                }
            }
            "message" => {
                let dst = text("dst");
                if !state.users.contains(&dst) {
                    json!({"status": "erro", "message": "Usuário destino não existe"})
                } else {
                    if let Some(broker) = &self.broker {
                        let payload = json!({
                            "src": text("src"),
                            "message": text("message"),
                            "timestamp": "2024-05-01T12:00:00",
                        });
                        broker.publish(&Topic::user(&dst), payload.to_string().as_bytes());
                    }
                    json!({"status": "OK"})
                }
            }
            _ => json!({"status": "erro", "description": "Serviço não reconhecido"}),
        };
        json!({ "service": service, "data": reply })
    }
}

#[async_trait]
impl RequestTransport for FakeServer {
    async fn exchange(&self, request: Vec<u8>) -> ChatResult<Vec<u8>> {
        let request: Value =
            serde_json::from_slice(&request).map_err(|e| ChatError::Decode(e.to_string()))?;
        let reply = self.handle(request);
        serde_json::to_vec(&reply).map_err(|e| ChatError::Encode(e.to_string()))
    }
}
