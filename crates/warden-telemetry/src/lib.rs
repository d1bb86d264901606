//! Warden Telemetry - structured logging setup

mod subscriber;

pub use subscriber::{init_subscriber, TelemetryConfig};
