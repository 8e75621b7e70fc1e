use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;

use travel_concierge::abuse::AbuseGuard;
use travel_concierge::channels::{CliChannel, CliInput};
use travel_concierge::collaborators::{InMemoryCatalog, UnconfiguredFlightSearch};
use travel_concierge::config::EngineConfig;
use travel_concierge::conversation::ConversationStore;
use travel_concierge::pipeline::{InboundProcessor, IntentDispatcher, Reply};
use travel_concierge::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env().context("invalid configuration")?;

    eprintln!("🧳 Travel Concierge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Abuse: bot after {} repeats in {} messages, {} replies per {}s",
        config.abuse.repeat_threshold,
        config.abuse.recent_capacity,
        config.abuse.max_responses,
        config.abuse.rate_window.as_secs(),
    );
    eprintln!("   Flights: {}", config.dispatcher.flight_search_url);
    eprintln!("   Type `sender: message` and press Enter. /send <sender> <text>, /scan, /list, /quit.\n");

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Engine ───────────────────────────────────────────────────────────
    let store = Arc::new(ConversationStore::new(db.clone()));
    let guard = Arc::new(AbuseGuard::load(config.abuse.clone(), db).await?);
    let dispatcher = IntentDispatcher::new(
        Arc::new(InMemoryCatalog::seeded()),
        Arc::new(UnconfiguredFlightSearch),
        config.dispatcher.clone(),
    );

    let cli = Arc::new(CliChannel::new());
    let processor = Arc::new(
        InboundProcessor::new(store, guard, dispatcher).with_outbound(cli.clone()),
    );

    let mut inputs = cli.start().await?;
    tracing::info!(channel = cli.name(), "Channel started");

    while let Some(input) = inputs.next().await {
        match input {
            CliInput::Event(event) => {
                let processor = Arc::clone(&processor);
                tokio::spawn(async move {
                    let sender = event.sender.clone();
                    if let Reply::Suppressed(reason) = processor.handle_inbound(event).await {
                        eprintln!("   (no reply to {sender}: {reason:?})");
                        eprint!("> ");
                    }
                });
            }
            CliInput::Command(command) => match command.as_str() {
                "quit" | "exit" => break,
                "scan" => match processor.scan_historical_bots().await {
                    Ok(detections) => {
                        eprintln!("   {} bot(s) detected", detections.len());
                        for d in detections {
                            eprintln!("   {}: {:?} x{}", d.sender, d.repeated_message, d.count);
                        }
                    }
                    Err(e) => eprintln!("   Scan failed: {e}"),
                },
                "list" => match processor.list_conversations(true).await {
                    Ok(conversations) => {
                        for c in conversations {
                            let tags: Vec<_> = c.tags.iter().map(String::as_str).collect();
                            eprintln!(
                                "   {} [{}{}] {} message(s) {:?}",
                                c.sender,
                                c.status,
                                if c.archived { ", archived" } else { "" },
                                c.messages.len(),
                                tags,
                            );
                        }
                    }
                    Err(e) => eprintln!("   List failed: {e}"),
                },
                other => match other
                    .strip_prefix("send ")
                    .and_then(|rest| rest.trim().split_once(' '))
                {
                    Some((to, text)) => match processor.send_manual(to, text.trim()).await {
                        Ok(_) => eprintln!("   Sent to {to}"),
                        Err(e) => eprintln!("   Send failed: {e}"),
                    },
                    None => eprintln!("   Unknown command: /{other}"),
                },
            },
        }
        eprint!("> ");
    }

    tracing::info!("Shutting down");
    Ok(())
}
