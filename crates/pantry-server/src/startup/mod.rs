//! Application startup utilities module.
//!
//! Logging initialisation, HTTP listener construction, and signal handling.

mod http;
mod logging;
mod shutdown;

pub use http::{main_server, sync_server};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
