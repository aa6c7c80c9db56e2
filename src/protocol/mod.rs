//! MQTT topic rules used by the subscriber session

pub mod topics;

pub use topics::{matches_filter, validate_filter, TopicError};
