//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod fastly;
pub mod http;
pub mod telemetry;
