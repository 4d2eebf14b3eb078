pub mod logging;
pub mod scheduler;

pub use crate::logging::LogFormat;
pub use crate::scheduler::JobScheduler;
