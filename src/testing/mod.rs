//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising the subscriber
//! session without an MQTT broker.

pub mod mocks;

pub use mocks::*;
