//! Per-message decision of whether and how the bot speaks.

use dave_core::config::EngagementConfig;
use dave_core::conversation::{BotIdentity, HistoryMessage, IncomingMessage};
use dave_core::generation::Context;
use rand::Rng;

/// What to do about one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngagementDecision {
    /// Stay quiet.
    NoReply,
    /// Continue a thread the bot started; reply to the incoming message.
    ReplyToThread { context: Context },
    /// Interject into the conversation.
    AmbientReply { context: Context },
}

/// Weighted-random engagement rules.
///
/// 1. A reply to one of the bot's messages always gets an answer, fed either
///    the (parent, reply) pair or just the reply.
/// 2. Otherwise, an ambient draw or an explicit `@mention` triggers an
///    interjection fed either the recent history window or the last message.
/// 3. Anything else is ignored.
///
/// Multi-utterance contexts route to the legacy backend, single ones to the
/// modern backend, so the pair/window weights also split traffic between them.
#[derive(Debug, Clone)]
pub struct EngagementPolicy {
    config: EngagementConfig,
}

impl EngagementPolicy {
    pub fn new(config: EngagementConfig) -> Self {
        Self { config }
    }

    /// Number of history entries `decide` wants to see.
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Decides for `message`.
    ///
    /// # Arguments
    ///
    /// * `message` - The incoming message, already recorded into history
    /// * `bot` - The bot's own identity
    /// * `recent` - Up to `window_size` latest history entries, oldest first
    /// * `rng` - Source of the weighted draws
    pub fn decide<R: Rng + ?Sized>(
        &self,
        message: &IncomingMessage,
        bot: &BotIdentity,
        recent: &[HistoryMessage],
        rng: &mut R,
    ) -> EngagementDecision {
        if let Some(parent) = message
            .reply_to
            .as_ref()
            .filter(|parent| parent.sender_id == bot.user_id)
        {
            if message.text.trim().is_empty() {
                return EngagementDecision::NoReply;
            }
            let context = if draw(rng, self.config.thread_pair_probability) {
                Context::Sequence(vec![parent.text.clone(), message.text.clone()])
            } else {
                Context::Single(message.text.clone())
            };
            return EngagementDecision::ReplyToThread { context };
        }

        // The ambient draw happens before the mention check, on every message.
        let ambient = draw(rng, self.config.ambient_probability);
        if !(ambient || message.text.starts_with(&bot.mention_token())) {
            return EngagementDecision::NoReply;
        }

        let Some(last) = recent.last() else {
            return EngagementDecision::NoReply;
        };

        let context = if draw(rng, self.config.window_probability) {
            let start = recent.len().saturating_sub(self.config.window_size.max(1));
            Context::Sequence(recent[start..].iter().map(|m| m.text.clone()).collect())
        } else {
            Context::Single(last.text.clone())
        };
        EngagementDecision::AmbientReply { context }
    }
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self::new(EngagementConfig::default())
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen_bool(probability.clamp(0.0, 1.0))
}
