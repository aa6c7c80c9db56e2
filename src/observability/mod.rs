//! Observability for the test client: structured logging setup and spans

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros (`session_span!`, `mqtt_span!`) are exported at the crate root
