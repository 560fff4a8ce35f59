//! MQTT topic names and filters.
//!
//! Filter syntax:
//! - `+` matches exactly one level
//! - `#` matches the parent level and any number of child levels (last only)
//! - literal levels match exactly

use super::TransportError;

/// Check whether a topic name matches a subscription filter.
///
/// Topics starting with `$` are never matched by a leading wildcard.
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Validate a subscription filter.
pub fn validate_filter(filter: &str) -> Result<(), TransportError> {
    if filter.is_empty() {
        return Err(TransportError::InvalidTopic("empty filter".to_string()));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != levels.len() - 1) {
            return Err(TransportError::InvalidTopic(format!(
                "'#' must be a whole, final level: {}",
                filter
            )));
        }
        if level.contains('+') && *level != "+" {
            return Err(TransportError::InvalidTopic(format!(
                "'+' must be a whole level: {}",
                filter
            )));
        }
    }

    Ok(())
}

/// Validate a topic name used for publishing (no wildcards).
pub fn validate_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() {
        return Err(TransportError::InvalidTopic("empty topic".to_string()));
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(TransportError::InvalidTopic(format!(
            "wildcards are not allowed when publishing: {}",
            topic
        )));
    }
    Ok(())
}
