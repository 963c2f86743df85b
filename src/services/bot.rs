//! Automated participant: logs in under a generated name and keeps publishing
//! canned messages to random channels.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::error::{ChatError, ChatResult};
use crate::services::session::ChatSession;

/// Channels created when the server has none.
pub const DEFAULT_CHANNELS: [&str; 4] = ["geral", "tech", "random", "bot-chat"];

const ADJECTIVES: &[&str] = &[
    "Quick", "Clever", "Curious", "Friendly", "Creative", "Busy", "Wise", "Jolly",
];
const NOUNS: &[&str] = &[
    "Bot", "Robot", "Assistant", "Helper", "Buddy", "Companion", "Sidekick", "Guide",
];
const MESSAGES: &[&str] = &[
    "Hello everyone! How is it going?",
    "Anyone up for a chat about technology?",
    "What a nice day today!",
    "Does anyone have an interesting tip to share?",
    "Let's talk about distributed systems!",
    "How about message queues?",
    "Anyone running containers in production?",
    "Share your experiences!",
    "Virtual coffee, anyone?",
    "Got any cool projects to show?",
];

/// Pacing of the publish loop.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub publishes_per_cycle: usize,
    /// Pause between two publishes, sampled uniformly.
    pub publish_delay: (Duration, Duration),
    /// Pause between two cycles, sampled uniformly.
    pub cycle_delay: (Duration, Duration),
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            publishes_per_cycle: 10,
            publish_delay: (Duration::from_secs(2), Duration::from_secs(5)),
            cycle_delay: (Duration::from_secs(10), Duration::from_secs(20)),
        }
    }
}

/// `<Adjective><Noun><1..=999>`, e.g. `CuriousHelper42`.
pub fn generate_username<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Busy");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Bot");
    let number: u32 = rng.gen_range(1..=999);
    format!("{}{}{}", adjective, noun, number)
}

/// Current channel list, creating [`DEFAULT_CHANNELS`] when the server has none.
/// Individual creation failures are logged; it fails only if no channel is usable.
pub async fn ensure_channels(session: &ChatSession) -> ChatResult<Vec<String>> {
    let channels = session.list_channels().await?;
    if !channels.is_empty() {
        return Ok(channels);
    }

    warn!("no channels available; creating defaults");
    let mut created = Vec::new();
    for channel in DEFAULT_CHANNELS {
        match session.create_channel(channel).await {
            Ok(()) => created.push(channel.to_string()),
            Err(e) => warn!(channel = %channel, error = %e, "could not create channel"),
        }
    }

    if created.is_empty() {
        return Err(ChatError::Application {
            status: String::new(),
            description: "no channel available".to_string(),
        });
    }
    Ok(created)
}

fn sample(rng: &mut StdRng, (min, max): (Duration, Duration)) -> Duration {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

pub struct Bot {
    session: ChatSession,
    settings: BotSettings,
    channels: Vec<String>,
    rng: StdRng,
}

impl Bot {
    /// Log in under a generated name, load channels, and subscribe to direct messages.
    pub async fn start(mut session: ChatSession, settings: BotSettings) -> ChatResult<Self> {
        let mut rng = StdRng::from_entropy();
        let username = generate_username(&mut rng);
        session.login(&username).await?;

        let channels = ensure_channels(&session).await?;
        info!(channels = ?channels, "channels available");
        session.subscribe_to_user().await?;

        info!(user = %username, "bot started");
        Ok(Self {
            session,
            settings,
            channels,
            rng,
        })
    }

    pub fn username(&self) -> &str {
        self.session.username().unwrap_or_default()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Publish until `shutdown` resolves. Returns the number of successful publishes.
    /// Failed publishes are logged and the loop carries on.
    pub async fn run_until<F>(mut self, shutdown: F) -> ChatResult<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut published = 0u64;

        loop {
            let Some(channel) = self.channels.choose(&mut self.rng).cloned() else {
                return Err(ChatError::Application {
                    status: String::new(),
                    description: "no channel available".to_string(),
                });
            };

            for _ in 0..self.settings.publishes_per_cycle {
                let message = MESSAGES.choose(&mut self.rng).copied().unwrap_or("Hi!");
                match self.session.publish(&channel, message).await {
                    Ok(()) => {
                        published += 1;
                        info!(channel = %channel, count = published, "message published");
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "publish failed"),
                }

                let pause = sample(&mut self.rng, self.settings.publish_delay);
                tokio::select! {
                    _ = &mut shutdown => return Ok(published),
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            info!("cycle finished");
            let pause = sample(&mut self.rng, self.settings.cycle_delay);
            tokio::select! {
                _ = &mut shutdown => return Ok(published),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fake::FakeServer;
    use std::sync::Arc;

    #[test]
    fn generated_names_follow_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let name = generate_username(&mut rng);
            let digits: String = name.chars().filter(char::is_ascii_digit).collect();
            let number: u32 = digits.parse().unwrap();
            assert!((1..=999).contains(&number), "{name}");
            assert!(name.ends_with(&digits));
            assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)), "{name}");
        }
    }

    #[test]
    fn sampled_pauses_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let wide = (Duration::from_secs(1), Duration::from_secs(u64::MAX / 2));
        for _ in 0..50 {
            let pause = sample(&mut rng, wide);
            assert!(pause >= wide.0 && pause <= wide.1, "{pause:?}");
        }
        let fixed = Duration::from_millis(5);
        assert_eq!(sample(&mut rng, (fixed, fixed)), fixed);
        assert_eq!(sample(&mut rng, (fixed, Duration::ZERO)), fixed);
    }

    #[tokio::test]
    async fn ensure_channels_creates_defaults_when_empty() {
        let server = FakeServer::new();
        let session = ChatSession::new(Arc::new(server.clone()));
        let channels = ensure_channels(&session).await.unwrap();
        assert_eq!(channels, DEFAULT_CHANNELS.map(String::from).to_vec());
        assert_eq!(session.list_channels().await.unwrap(), channels);
    }

    #[tokio::test]
    async fn ensure_channels_keeps_existing() {
        let server = FakeServer::new();
        server.seed_channel("lobby");
        let session = ChatSession::new(Arc::new(server.clone()));
        assert_eq!(
            ensure_channels(&session).await.unwrap(),
            vec!["lobby".to_string()]
        );
    }

    #[tokio::test]
    async fn bot_publishes_until_shutdown() {
        let server = FakeServer::new();
        let session = ChatSession::new(Arc::new(server.clone()));
        let settings = BotSettings {
            publishes_per_cycle: 3,
            publish_delay: (Duration::from_millis(1), Duration::from_millis(2)),
            cycle_delay: (Duration::from_millis(1), Duration::from_millis(2)),
        };
        let bot = Bot::start(session, settings).await.unwrap();
        assert!(!bot.username().is_empty());
        assert_eq!(bot.channels().len(), DEFAULT_CHANNELS.len());

        let published = bot
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(published > 0);

        let publishes = server
            .requests()
            .into_iter()
            .filter(|r| r["service"] == "publish")
            .count() as u64;
        assert_eq!(publishes, published);
    }
}
