//! Topic filter validation and matching
//!
//! Implements the MQTT 3.1.1 topic rules the subscriber session relies on:
//! a filter is checked before it is sent to the broker, and every inbound
//! message is matched against the active filter before it reaches the sink.

use thiserror::Error;

/// Multi-level wildcard, only valid as the last level of a filter
pub const MULTI_LEVEL_WILDCARD: &str = "#";
/// Single-level wildcard, only valid as a whole level
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Validation errors for topic filters
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic filter cannot be empty")]
    EmptyFilter,
    #[error("Topic filter contains a NUL character")]
    NulCharacter,
    #[error("Multi-level wildcard must be the last level: '{0}'")]
    MisplacedMultiLevelWildcard(String),
    #[error("Wildcard must occupy a whole level: '{0}'")]
    PartialLevelWildcard(String),
}

pub fn validate_filter(filter: &str) -> Result<(), TopicError> {
    if filter.is_empty() {
        return Err(TopicError::EmptyFilter);
    }
    if filter.contains('\0') {
        return Err(TopicError::NulCharacter);
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != MULTI_LEVEL_WILDCARD {
                return Err(TopicError::PartialLevelWildcard(filter.to_string()));
            }
            if index != last {
                return Err(TopicError::MisplacedMultiLevelWildcard(filter.to_string()));
            }
        }
        if level.contains('+') && *level != SINGLE_LEVEL_WILDCARD {
            return Err(TopicError::PartialLevelWildcard(filter.to_string()));
        }
    }

    Ok(())
}

/// Match a concrete topic name against a (valid) topic filter.
///
/// `#` matches the parent level and any number of child levels, `+` matches
/// exactly one level. Topics beginning with `$` are reserved for the broker
/// and never match a filter whose first level is a wildcard.
pub fn matches_filter(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            // "sport/#" also matches "sport"
            (Some(MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
