pub mod binding_store;
pub mod config_service;
pub mod history_sink;

pub use crate::binding_store::FileBindingStore;
pub use crate::config_service::ConfigService;
pub use crate::history_sink::FileHistorySink;
