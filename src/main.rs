use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use arbiter::clock::{Clock, SystemClock};
use arbiter::config::Config;
use arbiter::engine::generator::{MoveGenerator, UciGenerator};
use arbiter::engine::rules::ChessRules;
use arbiter::gateway::Gateway;
use arbiter::repositories::connection_repository::InMemoryConnectionRepository;
use arbiter::repositories::move_repository::InMemoryMoveRepository;
use arbiter::repositories::session_repository::InMemorySessionRepository;
use arbiter::repositories::user_repository::InMemoryUserRepository;
use arbiter::services::bot_service::BotService;
use arbiter::services::liveness_service::LivenessService;
use arbiter::services::queue_service::QueueService;
use arbiter::services::rating_service::RatingService;
use arbiter::services::session_service::SessionService;
use arbiter::transport::ChannelTransport;

/// Runs the orchestrator with an in-process transport and a line-based local
/// console: each stdin line is one client event, server events come back as
/// JSON lines. A real deployment replaces this loop with its own transport
/// adapter feeding the same `Gateway`.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = Arc::new(ChannelTransport::new());
    let connections = Arc::new(InMemoryConnectionRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());

    let rating = Arc::new(RatingService::new(users, clock.clone()));

    let generator: Option<Arc<dyn MoveGenerator>> = match &config.generator_command {
        Some(command) => {
            match UciGenerator::spawn(command, config.generator_depth, config.generator_timeout) {
                Ok(generator) => {
                    info!("move generator running: {}", command);
                    Some(Arc::new(generator))
                }
                Err(e) => {
                    warn!("move generator unavailable, bot matches degrade: {}", e);
                    None
                }
            }
        }
        None => None,
    };
    let bot = Arc::new(BotService::new(generator));
    if !bot.is_enabled() {
        info!("no move generator configured, bot matches will degrade");
    }

    let sessions = Arc::new(SessionService::new(
        Arc::new(InMemorySessionRepository::new()),
        Arc::new(InMemoryMoveRepository::new()),
        Arc::new(ChessRules::new()),
        rating.clone(),
        bot,
        transport.clone(),
        connections.clone(),
        clock.clone(),
    ));
    let queue = Arc::new(QueueService::new(
        sessions.clone(),
        rating.clone(),
        transport.clone(),
        clock,
        config.default_time_control_ms,
    ));
    let liveness = Arc::new(LivenessService::new(
        connections,
        queue.clone(),
        sessions.clone(),
        transport.clone(),
        config.grace_period,
    ));
    let gateway = Arc::new(Gateway::new(
        queue.clone(),
        sessions,
        liveness,
        transport.clone(),
    ));

    let sweeper = queue.spawn_sweeper(config.sweep_period);
    let inactivity = rating.spawn_inactivity_job(config.inactivity_period);

    let local_user = std::env::var("ARBITER_USER").unwrap_or_else(|_| "local-user".to_string());
    let connection_id = "local";
    let mut inbox = transport.register(connection_id);
    gateway.handle_connect(&local_user, connection_id).await;

    let printer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("unprintable event: {}", e),
            }
        }
    });

    info!("match orchestrator ready ({} on {})", local_user, connection_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    gateway.handle_message(connection_id, line.trim()).await;
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin error: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("shutting down");
    gateway.handle_disconnect(connection_id).await;
    sweeper.abort();
    inactivity.abort();
    printer.abort();
}
