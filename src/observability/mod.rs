//! Observability.
//!
//! Structured logging through `tracing`. Counters are emitted through the
//! `metrics` facade at the call sites; installing a recorder is left to the
//! embedding application.

mod logging;

pub use logging::{LoggingConfig, init_logging};
