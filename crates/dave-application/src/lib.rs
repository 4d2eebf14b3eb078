pub mod binding;
pub mod bot_service;
pub mod engagement;
pub mod history_log;
pub mod provenance_cache;
pub mod script;

pub use binding::ConversationBinding;
pub use bot_service::{BotService, MessageOutcome};
pub use engagement::{EngagementDecision, EngagementPolicy};
pub use history_log::HistoryLog;
pub use provenance_cache::{FifoMap, ProvenanceCache};
