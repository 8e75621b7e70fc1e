//! Inbound processor: records, screens and answers inbound events.
//!
//! Flow for one event:
//! 1. Record the inbound message (always, even when no reply follows)
//! 2. Blacklisted sender → suppress
//! 3. Update the repetition window; repetitive sender → blacklist, tag `Bot`, suppress
//! 4. Reply budget exhausted → suppress
//! 5. Dispatch to an intent and compute the reply
//! 6. Count the reply, record it, hand it to the outbound channel
//!
//! Events of one sender are handled one at a time. Different senders run
//! in parallel. Operator messages from [`InboundProcessor::send_manual`]
//! take the same per-sender lock but skip abuse screening and do not count
//! toward the reply budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::abuse::{AbuseGuard, BotDetection};
use crate::collaborators::OutboundSender;
use crate::conversation::model::{
    ConversationExport, ConversationStatus, ConversationView, Message, SenderId,
};
use crate::conversation::store::ConversationStore;
use crate::error::{ConversationError, DatabaseError};
use crate::pipeline::dispatcher::IntentDispatcher;
use crate::pipeline::types::{InboundEvent, Reply, SuppressReason};

/// Tag added to conversations of blacklisted bots.
pub const BOT_TAG: &str = "Bot";

/// Channel recorded on messages typed by a human operator.
pub const OPERATOR_CHANNEL: &str = "operator";

/// One async mutex per sender.
#[derive(Default)]
pub struct SenderLocks {
    locks: Mutex<HashMap<SenderId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SenderLocks {
    pub fn lock_for(&self, sender: &SenderId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(sender.clone())
            .or_default()
            .clone()
    }
}

pub struct InboundProcessor {
    store: Arc<ConversationStore>,
    guard: Arc<AbuseGuard>,
    dispatcher: IntentDispatcher,
    outbound: Option<Arc<dyn OutboundSender>>,
    locks: SenderLocks,
}

impl InboundProcessor {
    pub fn new(
        store: Arc<ConversationStore>,
        guard: Arc<AbuseGuard>,
        dispatcher: IntentDispatcher,
    ) -> Self {
        Self {
            store,
            guard,
            dispatcher,
            outbound: None,
            locks: SenderLocks::default(),
        }
    }

    /// Deliver replies through `outbound` in addition to returning them.
    pub fn with_outbound(mut self, outbound: Arc<dyn OutboundSender>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn guard(&self) -> &AbuseGuard {
        &self.guard
    }

    /// Handle one inbound event. Never fails: storage errors are logged and
    /// the reply decision goes ahead without them.
    pub async fn handle_inbound(&self, event: InboundEvent) -> Reply {
        let sender = SenderId::new(&event.sender);
        let lock = self.locks.lock_for(&sender);
        let _serialized = lock.lock().await;

        info!(
            sender = %sender,
            channel = %event.channel,
            kind = %event.kind,
            "Processing inbound message"
        );

        if let Err(e) = self.store.append(&event.sender, event.to_message()).await {
            error!(sender = %sender, error = %e, "Failed to record inbound message");
        }

        if let Some(reason) = self.screen(&sender, &event.content).await {
            info!(sender = %sender, ?reason, "Reply suppressed");
            return Reply::Suppressed(reason);
        }

        let text = self
            .dispatcher
            .respond(&sender, event.kind, &event.content)
            .await;

        self.guard.record_response_sent(&sender);
        if let Err(e) = self
            .store
            .append(&event.sender, Message::sent(text.clone(), &event.channel))
            .await
        {
            error!(sender = %sender, error = %e, "Failed to record reply");
        }

        self.deliver(&sender, &text);
        debug!(sender = %sender, "Reply produced");
        Reply::Text(text)
    }

    /// Send an operator-written message to `address`.
    ///
    /// The message is recorded as sent and handed to the outbound channel.
    /// It bypasses abuse screening and is not counted by the rate limiter.
    pub async fn send_manual(&self, address: &str, text: &str) -> Result<Message, DatabaseError> {
        let sender = SenderId::new(address);
        let lock = self.locks.lock_for(&sender);
        let _serialized = lock.lock().await;

        let message = self
            .store
            .append(address, Message::sent(text, OPERATOR_CHANNEL))
            .await?;
        info!(sender = %sender, "Manual message recorded");

        self.deliver(&sender, text);
        Ok(message)
    }

    /// Fire-and-forget delivery. Failures are logged only.
    fn deliver(&self, sender: &SenderId, text: &str) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        let outbound = Arc::clone(outbound);
        let (to, body) = (sender.clone(), text.to_string());
        tokio::spawn(async move {
            if let Err(e) = outbound.send(&to, &body).await {
                warn!(sender = %to, error = %e, "Outbound delivery failed");
            }
        });
    }

    /// Abuse checks, in order. `Some` means do not reply.
    async fn screen(&self, sender: &SenderId, content: &str) -> Option<SuppressReason> {
        if self.guard.is_blacklisted(sender) {
            return Some(SuppressReason::Blacklisted);
        }

        self.guard.record_inbound(sender, content);
        if self.guard.is_bot(sender) {
            self.flag_bot(sender, "repeated message content").await;
            return Some(SuppressReason::BotDetected);
        }

        if !self.guard.can_respond(sender) {
            return Some(SuppressReason::RateLimited);
        }
        None
    }

    async fn flag_bot(&self, sender: &SenderId, reason: &str) {
        if let Err(e) = self.guard.blacklist(sender, reason).await {
            error!(sender = %sender, error = %e, "Failed to persist blacklist entry");
        }
        if let Err(e) = self.store.add_tag(sender, BOT_TAG).await {
            error!(sender = %sender, error = %e, "Failed to tag bot conversation");
        }
    }

    /// Run the repetition rule over every stored conversation, archived
    /// included, and tag each new detection.
    pub async fn scan_historical_bots(&self) -> Result<Vec<BotDetection>, DatabaseError> {
        let conversations = self.store.list(true).await?;
        let detections = self.guard.scan_historical_bots(&conversations).await;
        for detection in &detections {
            if let Err(e) = self.store.add_tag(&detection.sender, BOT_TAG).await {
                error!(sender = %detection.sender, error = %e, "Failed to tag bot conversation");
            }
        }
        Ok(detections)
    }

    // ── Conversation passthroughs ───────────────────────────────────

    pub async fn list_conversations(
        &self,
        include_archived: bool,
    ) -> Result<Vec<ConversationView>, DatabaseError> {
        self.store.list(include_archived).await
    }

    pub async fn conversation(&self, address: &str) -> Result<Option<ConversationView>, DatabaseError> {
        self.store.get(&SenderId::new(address)).await
    }

    pub async fn add_tag(&self, address: &str, tag: &str) -> Result<bool, DatabaseError> {
        self.store.add_tag(&SenderId::new(address), tag).await
    }

    pub async fn remove_tag(&self, address: &str, tag: &str) -> Result<bool, DatabaseError> {
        self.store.remove_tag(&SenderId::new(address), tag).await
    }

    pub async fn set_status(
        &self,
        address: &str,
        status: &str,
    ) -> Result<ConversationStatus, ConversationError> {
        self.store.set_status(&SenderId::new(address), status).await
    }

    pub async fn archive(&self, address: &str) -> Result<bool, DatabaseError> {
        self.store.archive(&SenderId::new(address)).await
    }

    pub async fn unarchive(&self, address: &str) -> Result<bool, DatabaseError> {
        self.store.unarchive(&SenderId::new(address)).await
    }

    pub async fn export(&self, address: &str) -> Result<Option<ConversationExport>, DatabaseError> {
        self.store.export(&SenderId::new(address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryCatalog, UnconfiguredFlightSearch};
    use crate::config::{AbuseConfig, DispatcherConfig};
    use crate::conversation::model::{Direction, MessageKind};
    use crate::pipeline::replies;
    use crate::store::LibSqlBackend;

    async fn processor() -> InboundProcessor {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let store = Arc::new(ConversationStore::new(db.clone()));
        let guard = Arc::new(AbuseGuard::load(AbuseConfig::default(), db).await.unwrap());
        let dispatcher = IntentDispatcher::new(
            Arc::new(InMemoryCatalog::seeded()),
            Arc::new(UnconfiguredFlightSearch),
            DispatcherConfig::default(),
        );
        InboundProcessor::new(store, guard, dispatcher)
    }

    #[tokio::test]
    async fn reply_is_recorded_after_inbound() {
        let p = processor().await;
        let reply = p.handle_inbound(InboundEvent::text("+52 1 55", "hola", "whatsapp")).await;
        assert_eq!(reply, Reply::Text(replies::GREETING.to_string()));

        let view = p.conversation("52155").await.unwrap().unwrap();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].direction, Direction::Received);
        assert_eq!(view.messages[1].direction, Direction::Sent);
        assert_eq!(view.messages[1].content, replies::GREETING);
        assert_eq!(view.status, ConversationStatus::New);
    }

    #[tokio::test]
    async fn third_repeat_is_suppressed_and_tagged() {
        let p = processor().await;
        let send = |text: &'static str| p.handle_inbound(InboundEvent::text("777", text, "whatsapp"));

        assert!(!send("promo").await.is_suppressed());
        assert!(!send("promo").await.is_suppressed());
        assert_eq!(send("promo").await, Reply::Suppressed(SuppressReason::BotDetected));
        assert_eq!(send("hola").await, Reply::Suppressed(SuppressReason::Blacklisted));

        let sender = SenderId::new("777");
        assert!(p.guard().is_blacklisted(&sender));
        assert!(p.store().tags(&sender).await.unwrap().contains(BOT_TAG));

        // Every inbound is recorded; only the first two got replies
        let view = p.conversation("777").await.unwrap().unwrap();
        let received = view.messages.iter().filter(|m| m.direction == Direction::Received).count();
        assert_eq!((received, view.messages.len() - received), (4, 2));
    }

    #[tokio::test]
    async fn non_text_event_gets_ack() {
        let p = processor().await;
        let event = InboundEvent {
            kind: MessageKind::Image,
            ..InboundEvent::text("9", "media-123", "whatsapp")
        };
        let reply = p.handle_inbound(event).await;
        assert_eq!(reply.text(), Some(replies::non_text_ack(MessageKind::Image).as_str()));
    }

    #[tokio::test]
    async fn historical_scan_tags_archived_conversations() {
        let p = processor().await;
        let store = p.store();
        for body in ["spam", "spam", "hola", "spam"] {
            store
                .append("old", Message::received(MessageKind::Text, body, "whatsapp"))
                .await
                .unwrap();
        }
        assert!(p.archive("old").await.unwrap());

        let detections = p.scan_historical_bots().await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].repeated_message, "spam");
        assert!(store.tags(&SenderId::new("old")).await.unwrap().contains(BOT_TAG));

        // Already blacklisted now, so a second pass reports nothing
        assert!(p.scan_historical_bots().await.unwrap().is_empty());
    }

    #[test]
    fn sender_locks_are_shared_per_sender() {
        let locks = SenderLocks::default();
        let a = SenderId::new("a");
        assert!(Arc::ptr_eq(&locks.lock_for(&a), &locks.lock_for(&a)));
        assert!(!Arc::ptr_eq(&locks.lock_for(&a), &locks.lock_for(&SenderId::new("b"))));
    }
}
