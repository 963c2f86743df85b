//! Entry point: load config, connect, and run the interactive loop or the bot.

use chatlink::config::{Config, RunMode};
use chatlink::console::{self, Command, ParseError};
use chatlink::services::{Bot, BotSettings};
use chatlink::{ChatError, ChatSession, Delivery};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(ChatError::from)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (mut session, source) = chatlink::connect(&config).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
    let mut listener = session.start_listener(source, tx)?;
    let printer = tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            println!("{}", delivery.render());
        }
    });

    match config.mode {
        RunMode::Bot => {
            let bot = Bot::start(session, BotSettings::default()).await?;
            info!(user = %bot.username(), "bot running; ctrl-c to stop");
            let published = bot
                .run_until(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(error = ?err, "failed to install ctrl-c handler");
                    }
                })
                .await?;
            info!(published, "bot stopped");
        }
        RunMode::Interactive => run_interactive(&mut session, config.username).await?,
    }

    listener.shutdown();
    printer.abort();
    Ok(())
}

async fn prompt_line<R>(lines: &mut tokio::io::Lines<R>, prompt: &str) -> anyhow::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?)
}

async fn run_interactive(session: &mut ChatSession, username: Option<String>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let username = match username {
        Some(name) => name,
        None => match prompt_line(&mut lines, "username: ").await? {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => anyhow::bail!("no username given"),
        },
    };
    session.login(&username).await?;
    session.subscribe_to_user().await?;
    println!("logged in as {}. {}", username, console::HELP);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                None
            }
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                eprintln!("!!! {}", e);
                continue;
            }
        };
        match console::execute(session, command).await {
            Ok(output) => println!("*** {}", output),
            Err(e) if e.is_application() => eprintln!("!!! {}", e),
            Err(e) => {
                warn!(error = %e, "request failed");
                eprintln!("!!! {}", e);
            }
        }
    }
    Ok(())
}
