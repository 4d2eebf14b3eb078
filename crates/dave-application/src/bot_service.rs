//! BotService - the engagement path and the scheduled jobs around it.

use crate::binding::ConversationBinding;
use crate::engagement::{EngagementDecision, EngagementPolicy};
use crate::history_log::HistoryLog;
use crate::provenance_cache::ProvenanceCache;
use dave_core::Result;
use dave_core::config::DaveConfig;
use dave_core::conversation::{ChatId, IncomingMessage, MessageId};
use dave_core::generation::{Backend, Context, VersionTransition};
use dave_core::transport::{ChatTransport, HistorySink};
use dave_interaction::Predictor;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const BIND_COMMAND: &str = "/bind_group";
pub const BLAME_COMMAND: &str = "/blame";

const BOUND_REPLY: &str = "Bound to group.";
const ROTATED_REPLY: &str = "Log rotated.";

/// What `handle_message` did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Not from the bound conversation (or nothing is bound).
    Ignored,
    /// Recorded; the policy chose silence (or the generation was empty).
    NoReply,
    /// A reply was sent and its provenance recorded.
    Replied {
        message_id: MessageId,
        backend: Backend,
    },
    /// Generation or delivery failed; nothing was sent or recorded.
    Failed,
    /// A bot command was handled.
    Command,
}

/// Ties the predictor, policy, history and provenance together.
pub struct BotService {
    predictor: Arc<Predictor>,
    transport: Arc<dyn ChatTransport>,
    binding: Arc<ConversationBinding>,
    sink: Arc<dyn HistorySink>,
    policy: EngagementPolicy,
    history: HistoryLog,
    provenance: ProvenanceCache,
    rng: Mutex<StdRng>,
}

impl BotService {
    /// Creates a service with empty history and provenance.
    ///
    /// # Arguments
    ///
    /// * `predictor` - Dual-backend predictor
    /// * `transport` - Chat transport replies go through
    /// * `binding` - Bound conversation and bot identity
    /// * `sink` - Receiver of drained history
    /// * `config` - Engagement and provenance settings
    /// * `source_channel` - Tag stamped on every history entry
    pub fn new(
        predictor: Arc<Predictor>,
        transport: Arc<dyn ChatTransport>,
        binding: Arc<ConversationBinding>,
        sink: Arc<dyn HistorySink>,
        config: &DaveConfig,
        source_channel: &str,
    ) -> Self {
        Self {
            predictor,
            transport,
            binding,
            sink,
            policy: EngagementPolicy::new(config.engagement.clone()),
            history: HistoryLog::new(source_channel),
            provenance: ProvenanceCache::new(config.provenance.capacity),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn provenance(&self) -> &ProvenanceCache {
        &self.provenance
    }

    pub fn binding(&self) -> &ConversationBinding {
        &self.binding
    }

    /// Rebinds to the persisted conversation, if any.
    pub async fn restore_binding(&self) -> Result<Option<ChatId>> {
        self.binding.restore().await
    }

    /// Handles one message observed on the transport.
    ///
    /// Generation and delivery failures are logged and reported as
    /// `MessageOutcome::Failed`; history already recorded stays recorded and
    /// no provenance entry is created.
    pub async fn handle_message(&self, message: &IncomingMessage) -> Result<MessageOutcome> {
        let text = message.text.trim();
        if let Some(token) = command_argument(text, BIND_COMMAND) {
            return self.handle_bind(message, token).await;
        }
        if command_argument(text, BLAME_COMMAND).is_some() {
            return self.handle_blame(message).await;
        }

        let Some(chat) = self.binding.bound_chat().await else {
            return Ok(MessageOutcome::Ignored);
        };
        if message.chat_id != chat {
            return Ok(MessageOutcome::Ignored);
        }

        self.history.record(message).await;
        let recent = self.history.last_messages(self.policy.window_size()).await;

        let decision = {
            let mut rng = self.rng.lock().await;
            self.policy
                .decide(message, self.binding.identity(), &recent, &mut *rng)
        };
        tracing::debug!(message_id = message.id, ?decision, "Engagement decided");

        match decision {
            EngagementDecision::NoReply => Ok(MessageOutcome::NoReply),
            EngagementDecision::ReplyToThread { context } => {
                Ok(self.generate_and_send(chat, Some(message.id), context).await)
            }
            EngagementDecision::AmbientReply { context } => {
                Ok(self.generate_and_send(chat, None, context).await)
            }
        }
    }

    async fn generate_and_send(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        context: Context,
    ) -> MessageOutcome {
        if let Err(err) = self.transport.send_typing(chat).await {
            tracing::debug!(error = %err, "Typing indicator failed");
        }

        let result = match self.predictor.predict(context, false).await {
            Ok(result) => result,
            Err(err) if err.is_generation_failure() => {
                tracing::warn!(error = %err, "Prediction failed; no reply this turn");
                return MessageOutcome::Failed;
            }
            Err(err) => {
                tracing::error!(error = %err, "Unexpected prediction error");
                return MessageOutcome::Failed;
            }
        };

        if result.rendered_text.is_empty() {
            tracing::debug!(backend = %result.backend, "Empty generation; not sending");
            return MessageOutcome::NoReply;
        }

        let sent = match reply_to {
            Some(parent) => {
                self.transport
                    .reply(chat, parent, &result.rendered_text)
                    .await
            }
            None => self.transport.send_message(chat, &result.rendered_text).await,
        };
        let message_id = match sent {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "Reply delivery failed");
                return MessageOutcome::Failed;
            }
        };

        let backend = result.backend;
        self.provenance.put(message_id, result).await;
        tracing::info!(message_id, %backend, "Reply sent");
        MessageOutcome::Replied {
            message_id,
            backend,
        }
    }

    async fn handle_bind(&self, message: &IncomingMessage, token: &str) -> Result<MessageOutcome> {
        match self.binding.try_bind(message.chat_id, token).await {
            Ok(true) => {
                self.transport
                    .reply(message.chat_id, message.id, BOUND_REPLY)
                    .await?;
            }
            Ok(false) => tracing::debug!(chat = message.chat_id, "Binding key mismatch"),
            Err(err) => tracing::warn!(error = %err, "Failed to persist binding"),
        }
        Ok(MessageOutcome::Command)
    }

    /// Answers "why did you say that".
    ///
    /// Replying to a bot message explains that message; a bare `/blame`
    /// explains the most recent reply.
    async fn handle_blame(&self, message: &IncomingMessage) -> Result<MessageOutcome> {
        let explanation = match &message.reply_to {
            Some(parent) => {
                let found = if parent.sender_id == self.binding.identity().user_id {
                    self.provenance.get(parent.id).await
                } else {
                    None
                };
                match found {
                    Some(result) => Some(result.dump()?),
                    None => Some(ROTATED_REPLY.to_string()),
                }
            }
            None => match self.provenance.most_recent().await {
                Some(result) => Some(result.dump()?),
                None => None,
            },
        };

        if let Some(text) = explanation {
            self.transport
                .reply(message.chat_id, message.id, &text)
                .await?;
        }
        Ok(MessageOutcome::Command)
    }

    /// Polls both backends and announces every model swap in the bound chat.
    ///
    /// # Errors
    ///
    /// The first failed announcement, after all of them were attempted.
    ///
    /// # Returns
    ///
    /// `None` when no conversation is bound (nothing is polled).
    pub async fn poll_model_updates(
        &self,
    ) -> Result<Option<(VersionTransition, VersionTransition)>> {
        let Some(chat) = self.binding.bound_chat().await else {
            return Ok(None);
        };

        let (legacy, modern) = self.predictor.update_models().await?;

        // A transition is reported once by the backend, so every notice is
        // attempted even if an earlier one failed.
        let mut first_error = None;
        for (backend, transition) in [(Backend::Legacy, &legacy), (Backend::Modern, &modern)] {
            let Some(text) = update_notice(backend, transition) else {
                continue;
            };
            if let Err(err) = self.transport.send_message(chat, &text).await {
                tracing::warn!(%backend, error = %err, "Failed to announce model update");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(Some((legacy, modern))),
        }
    }

    /// Hands a snapshot of the history to the sink.
    ///
    /// # Returns
    ///
    /// Number of entries drained.
    pub async fn drain_history(&self) -> Result<usize> {
        let snapshot = self.history.snapshot().await;
        self.sink.upload(&snapshot).await?;
        tracing::debug!(entries = snapshot.len(), "History drained");
        Ok(snapshot.len())
    }

    /// Final drain, then releases the predictor's connection.
    pub async fn shutdown(&self) {
        if let Err(err) = self.drain_history().await {
            tracing::warn!(error = %err, "Final history drain failed");
        }
        self.predictor.close().await;
        tracing::info!("Bot shutdown complete");
    }
}

/// Text after `command` when `text` starts with it as a whole word.
///
/// Accepts the addressed form `/command@botname` as well.
fn command_argument<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let name = head.split_once('@').map_or(head, |(name, _)| name);
    (name == command).then(|| rest.trim())
}

fn update_notice(backend: Backend, transition: &VersionTransition) -> Option<String> {
    if !transition.updated {
        return None;
    }
    Some(format!(
        "{} model updated.\n{} -> {}",
        backend,
        transition.previous_version.as_deref().unwrap_or("?"),
        transition.current_version
    ))
}
