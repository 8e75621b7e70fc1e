//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Each line is `sender: text`. A line without a sender is attributed to
//! `local-user`. A body of the form `[image] media-id` simulates a non-text
//! message. Lines starting with `/` are operator commands.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, stream};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collaborators::OutboundSender;
use crate::conversation::model::{MessageKind, SenderId};
use crate::error::ChannelError;
use crate::pipeline::types::InboundEvent;

const CHANNEL: &str = "cli";
const DEFAULT_SENDER: &str = "local-user";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliInput {
    Event(InboundEvent),
    /// Operator command without the leading `/`, e.g. `scan`.
    Command(String),
}

pub type CliStream = Pin<Box<dyn Stream<Item = CliInput> + Send>>;

/// Reads events from stdin and prints replies to stdout.
#[derive(Debug, Default)]
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        CHANNEL
    }

    /// Spawn the stdin reader and return its input stream. Ends on EOF.
    pub async fn start(&self) -> Result<CliStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(input) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(input).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|input| (input, rx))
        });

        Ok(Box::pin(stream))
    }
}

/// Parse one REPL line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<CliInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(command) = line.strip_prefix('/') {
        return Some(CliInput::Command(command.trim().to_string()));
    }

    let (sender, body) = match line.split_once(':') {
        Some((sender, body)) if !SenderId::new(sender).as_str().is_empty() => {
            (sender.trim(), body.trim())
        }
        _ => (DEFAULT_SENDER, line),
    };

    let mut event = InboundEvent::text(sender, body, CHANNEL);
    if let Some((kind, content)) = body
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
    {
        event.kind = MessageKind::parse(kind);
        event.content = content.trim().to_string();
    }
    Some(CliInput::Event(event))
}

#[async_trait]
impl OutboundSender for CliChannel {
    async fn send(&self, sender: &SenderId, text: &str) -> Result<(), ChannelError> {
        println!("\n[→ {sender}]\n{text}\n");
        eprint!("> ");
        Ok(())
    }
}
